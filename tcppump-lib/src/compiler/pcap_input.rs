use crate::error::{PumpError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::time::Duration;

const MAGIC_LE: u32 = 0xa1b2_c3d4;
const MAGIC_BE: u32 = 0xd4c3_b2a1;
const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

/// One decoded capture record: its raw frame bytes and the time elapsed
/// since the previous record (zero for the first).
pub struct PcapRecord {
    pub bytes: Vec<u8>,
    pub delta_since_previous: Duration,
}

/// Decodes a classic libpcap (microsecond-resolution) capture file into a
/// sequence of frame records with inter-record deltas, the raw material the
/// Compiler's PCAP input mode scales by `--pcap`.
///
/// Only the classic (non-nanosecond, non-pcapng) format is supported, the
/// same format this crate's own `pcap_file` backend writes.
pub fn read_pcap_file(data: &[u8], path: &str) -> Result<Vec<PcapRecord>> {
    if data.len() < GLOBAL_HEADER_LEN {
        return Err(PumpError::parse(
            format!("{path}: truncated pcap global header"),
            crate::error::Span::default(),
        ));
    }

    let magic_le = LittleEndian::read_u32(&data[0..4]);
    let magic_be = BigEndian::read_u32(&data[0..4]);
    let big_endian = if magic_le == MAGIC_LE {
        false
    } else if magic_be == MAGIC_BE || magic_le == MAGIC_BE {
        true
    } else {
        return Err(PumpError::parse(format!("{path}: not a libpcap capture file"), crate::error::Span::default()));
    };

    let mut records = Vec::new();
    let mut offset = GLOBAL_HEADER_LEN;
    let mut previous: Option<(u64, u32)> = None;

    while offset < data.len() {
        if data.len() - offset < RECORD_HEADER_LEN {
            return Err(PumpError::parse(format!("{path}: truncated record header"), crate::error::Span::default()));
        }
        let header = &data[offset..offset + RECORD_HEADER_LEN];
        let (ts_sec, ts_usec, incl_len) = if big_endian {
            (BigEndian::read_u32(&header[0..4]), BigEndian::read_u32(&header[4..8]), BigEndian::read_u32(&header[8..12]))
        } else {
            (LittleEndian::read_u32(&header[0..4]), LittleEndian::read_u32(&header[4..8]), LittleEndian::read_u32(&header[8..12]))
        };
        offset += RECORD_HEADER_LEN;

        let incl_len = incl_len as usize;
        if data.len() - offset < incl_len {
            return Err(PumpError::parse(format!("{path}: truncated record payload"), crate::error::Span::default()));
        }
        let bytes = data[offset..offset + incl_len].to_vec();
        offset += incl_len;

        let delta = match previous {
            None => Duration::ZERO,
            Some((prev_sec, prev_usec)) => {
                let prev = Duration::from_secs(prev_sec) + Duration::from_micros(prev_usec as u64);
                let now = Duration::from_secs(ts_sec as u64) + Duration::from_micros(ts_usec as u64);
                now.saturating_sub(prev)
            }
        };
        previous = Some((ts_sec as u64, ts_usec));
        records.push(PcapRecord { bytes, delta_since_previous: delta });
    }

    Ok(records)
}

/// Scales a record's natural delta by the `--pcap` scale factor. A scale of
/// zero collapses every timestamp to zero (explicit throughput mode).
pub fn scale_delta(delta: Duration, scale: u32) -> Duration {
    if scale == 0 {
        Duration::ZERO
    } else {
        delta * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{pcap_file::PcapFileBackend, Backend};

    #[test]
    fn reads_back_frames_and_deltas_written_by_our_own_backend() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tcppump-pcap-input-test-{}.pcap", std::process::id()));
        {
            let mut backend = PcapFileBackend::create(&path).unwrap();
            backend.write_frame(Duration::from_micros(1_000_000), &[1, 2, 3]).unwrap();
            backend.write_frame(Duration::from_micros(1_250_000), &[4, 5]).unwrap();
        }

        let data = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let records = read_pcap_file(&data, "test.pcap").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bytes, vec![1, 2, 3]);
        assert_eq!(records[0].delta_since_previous, Duration::ZERO);
        assert_eq!(records[1].bytes, vec![4, 5]);
        assert_eq!(records[1].delta_since_previous, Duration::from_micros(250_000));
    }

    #[test]
    fn scale_zero_collapses_to_throughput_mode() {
        assert_eq!(scale_delta(Duration::from_millis(10), 0), Duration::ZERO);
        assert_eq!(scale_delta(Duration::from_millis(10), 3), Duration::from_millis(30));
    }

    #[test]
    fn rejects_non_pcap_data() {
        assert!(read_pcap_file(b"not a pcap file at all", "bad.pcap").is_err());
    }
}
