pub mod pcap_file;
pub mod queue;
pub mod text_file;

use crate::error::Result;
use std::time::Duration;

/// Aggregate counters a backend reports once a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStatistics {
    pub packets: u64,
    pub bytes: u64,
}

/// Sink for emitted frames. File backends (pcap/text/hexstream/hexdump)
/// implement this directly; the binary crate's raw-interface backend also
/// implements it, optionally via the bounded send queue in [`queue`].
pub trait Backend {
    fn write_frame(&mut self, send_time: Duration, frame: &[u8]) -> Result<()>;
    fn statistics(&self) -> BackendStatistics;
}
