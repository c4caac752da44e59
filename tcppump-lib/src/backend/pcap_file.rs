use super::{Backend, BackendStatistics};
use crate::error::{PumpError, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const LINKTYPE_ETHERNET: u32 = 1;
const SNAPLEN: u32 = 65535;

/// Writes frames as a classic libpcap capture file: one global header
/// followed by a `ts_sec/ts_usec/incl_len/orig_len` record per frame.
///
/// Byte layout follows the well-known public libpcap format rather than any
/// single source file; little-endian, as written by the reference `pcap_dump`
/// on x86/ARM hosts.
pub struct PcapFileBackend {
    writer: BufWriter<Box<dyn Write + Send>>,
    path: String,
    statistics: BackendStatistics,
}

impl PcapFileBackend {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();
        let file = File::create(path.as_ref()).map_err(|e| PumpError::file_io(path_str.clone(), "create", e))?;
        Self::to_writer(Box::new(file), path_str)
    }

    /// Writes to an already-open sink instead of creating a file; used for
    /// `-w -` (stdout).
    pub fn to_writer(sink: Box<dyn Write + Send>, label: impl Into<String>) -> Result<Self> {
        let path_str = label.into();
        let mut writer = BufWriter::new(sink);
        Self::write_global_header(&mut writer, &path_str)?;
        Ok(Self { writer, path: path_str, statistics: BackendStatistics::default() })
    }

    fn write_global_header(writer: &mut BufWriter<Box<dyn Write + Send>>, path: &str) -> Result<()> {
        let mut write = || -> std::io::Result<()> {
            writer.write_u32::<LittleEndian>(PCAP_MAGIC)?;
            writer.write_u16::<LittleEndian>(PCAP_VERSION_MAJOR)?;
            writer.write_u16::<LittleEndian>(PCAP_VERSION_MINOR)?;
            writer.write_i32::<LittleEndian>(0)?; // thiszone
            writer.write_u32::<LittleEndian>(0)?; // sigfigs
            writer.write_u32::<LittleEndian>(SNAPLEN)?;
            writer.write_u32::<LittleEndian>(LINKTYPE_ETHERNET)?;
            Ok(())
        };
        write().map_err(|e| PumpError::file_io(path, "write global header", e))
    }
}

impl Backend for PcapFileBackend {
    fn write_frame(&mut self, send_time: Duration, frame: &[u8]) -> Result<()> {
        let incl_len = frame.len() as u32;
        let mut write = || -> std::io::Result<()> {
            self.writer.write_u32::<LittleEndian>(send_time.as_secs() as u32)?;
            self.writer.write_u32::<LittleEndian>(send_time.subsec_micros())?;
            self.writer.write_u32::<LittleEndian>(incl_len)?;
            self.writer.write_u32::<LittleEndian>(incl_len)?;
            self.writer.write_all(frame)?;
            Ok(())
        };
        write().map_err(|e| PumpError::file_io(self.path.clone(), "write record", e))?;
        self.statistics.packets += 1;
        self.statistics.bytes += frame.len() as u64;
        Ok(())
    }

    fn statistics(&self) -> BackendStatistics {
        self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_global_header_and_one_record() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tcppump-pcap-test-{}.pcap", std::process::id()));

        {
            let mut backend = PcapFileBackend::create(&path).unwrap();
            backend.write_frame(Duration::from_micros(1_500_250), &[0xde, 0xad, 0xbe, 0xef]).unwrap();
            assert_eq!(backend.statistics().packets, 1);
            assert_eq!(backend.statistics().bytes, 4);
        }

        let mut buf = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(&buf[0..4], &PCAP_MAGIC.to_le_bytes());
        assert_eq!(&buf[4..6], &PCAP_VERSION_MAJOR.to_le_bytes());
        assert_eq!(&buf[6..8], &PCAP_VERSION_MINOR.to_le_bytes());
        assert_eq!(&buf[20..24], &LINKTYPE_ETHERNET.to_le_bytes());

        let record = &buf[24..];
        assert_eq!(u32::from_le_bytes(record[0..4].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(record[4..8].try_into().unwrap()), 500_250);
        assert_eq!(u32::from_le_bytes(record[8..12].try_into().unwrap()), 4);
        assert_eq!(u32::from_le_bytes(record[12..16].try_into().unwrap()), 4);
        assert_eq!(&record[16..20], &[0xde, 0xad, 0xbe, 0xef]);
    }
}
