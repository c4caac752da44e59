use crate::address::{IpAddress, Ip6Address, MacAddress};
use crate::error::Result;
use std::time::Duration;

/// Aggregate counters returned after a run completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStatistics {
    pub packets: u64,
    pub bytes: u64,
    pub duration: Duration,
}

/// The OS-facing boundary the core pipeline talks to. A concrete
/// implementation (raw `AF_PACKET` sockets on Linux, `Npcap` elsewhere) lives
/// in the binary crate; everything in this crate is written purely against
/// this trait so it never touches a real NIC.
pub trait NetInterface {
    fn open(&mut self, send_only: bool) -> Result<()>;
    fn close(&mut self) -> Result<()>;

    /// Sends one frame. `send_time` is the scheduled absolute send time in
    /// real-time mode, ignored in throughput mode.
    fn send_packet(&mut self, bytes: &[u8], send_time: Option<Duration>) -> Result<()>;

    /// Reserves queue capacity ahead of a run where sends are buffered by a
    /// worker thread (see the bounded send queue in the binary crate).
    fn prepare_send_queue(&mut self, count: usize, total_bytes: usize, realtime: bool) -> Result<()>;
    fn flush_send_queue(&mut self) -> Result<()>;

    fn get_send_statistic(&self) -> SendStatistics;

    fn get_mac(&self) -> MacAddress;
    fn get_ipv4(&self) -> Option<IpAddress>;
    fn get_ipv6(&self) -> Option<Ip6Address>;
    fn get_mtu(&self) -> usize;

    /// Blocks until a matching frame arrives or `drop_before_timestamp` has
    /// elapsed; used by Wait items and ARP resolution.
    fn receive_packet(&mut self, buf: &mut [u8], bpf: Option<&dyn crate::bpf::BpfFilter>, drop_before_timestamp: Option<Duration>) -> Result<usize>;

    fn add_receive_filter(&mut self, bpf_text: &str) -> Result<()>;
}
