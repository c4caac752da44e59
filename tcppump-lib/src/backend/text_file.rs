use super::{Backend, BackendStatistics};
use crate::error::{PumpError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Which of the three human-readable dump styles a [`TextFileBackend`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// `NNNNN\tSEC.USEC\t` prefix followed by space-separated hex bytes.
    Text,
    /// Contiguous hex digits, no separators, one packet per line.
    HexStream,
    /// 16-bytes-per-line offset/hex/ASCII dump, one block per packet.
    HexDump,
}

/// Writes frames in one of the line-oriented text formats. Grounded in the
/// original ASCII backend's packet-number (`%5lu`) and timestamp
/// (`%jd.%06lu`) prefixes and its `dump()` hexdump loop.
pub struct TextFileBackend {
    writer: BufWriter<Box<dyn Write + Send>>,
    path: String,
    format: TextFormat,
    statistics: BackendStatistics,
}

impl TextFileBackend {
    pub fn create(path: impl AsRef<Path>, format: TextFormat) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();
        let file = File::create(path.as_ref()).map_err(|e| PumpError::file_io(path_str.clone(), "create", e))?;
        Ok(Self { writer: BufWriter::new(Box::new(file)), path: path_str, format, statistics: BackendStatistics::default() })
    }

    /// Writes to an already-open sink instead of creating a file; used for
    /// `-w -` (stdout).
    pub fn to_writer(sink: Box<dyn Write + Send>, label: impl Into<String>, format: TextFormat) -> Self {
        Self { writer: BufWriter::new(sink), path: label.into(), format, statistics: BackendStatistics::default() }
    }

    fn write_prefix(&mut self, send_time: Duration) -> std::io::Result<()> {
        write!(
            self.writer,
            "{:>5}\t{}.{:06}\t",
            self.statistics.packets + 1,
            send_time.as_secs(),
            send_time.subsec_micros()
        )
    }

    fn write_text(&mut self, frame: &[u8]) -> std::io::Result<()> {
        for (i, byte) in frame.iter().enumerate() {
            if i > 0 {
                write!(self.writer, " ")?;
            }
            write!(self.writer, "{byte:02x}")?;
        }
        writeln!(self.writer)
    }

    fn write_hex_stream(&mut self, frame: &[u8]) -> std::io::Result<()> {
        for byte in frame {
            write!(self.writer, "{byte:02x}")?;
        }
        writeln!(self.writer)
    }

    /// Ports the original `dump()` loop: 16 bytes per row, offset column,
    /// per-byte hex, and a printable-or-`.` ASCII sidebar flushed at each
    /// row boundary (and padded out on the final short row).
    fn write_hex_dump(&mut self, frame: &[u8]) -> std::io::Result<()> {
        let mut ascii = String::with_capacity(16);
        for (i, &byte) in frame.iter().enumerate() {
            if i % 16 == 0 {
                if i > 0 {
                    writeln!(self.writer, "  {ascii}")?;
                    ascii.clear();
                }
                write!(self.writer, "{i:04x} ")?;
            }
            write!(self.writer, " {byte:02x}")?;
            ascii.push(if (0x20..=0x7e).contains(&byte) { byte as char } else { '.' });
        }
        let remainder = frame.len() % 16;
        let padding = if frame.is_empty() { 0 } else if remainder == 0 { 0 } else { 16 - remainder };
        for _ in 0..padding {
            write!(self.writer, "   ")?;
        }
        writeln!(self.writer, "  {ascii}")
    }
}

impl Backend for TextFileBackend {
    fn write_frame(&mut self, send_time: Duration, frame: &[u8]) -> Result<()> {
        let result: std::io::Result<()> = (|| {
            if self.format == TextFormat::Text {
                self.write_prefix(send_time)?;
            }
            match self.format {
                TextFormat::Text => self.write_text(frame),
                TextFormat::HexStream => self.write_hex_stream(frame),
                TextFormat::HexDump => self.write_hex_dump(frame),
            }
        })();
        result.map_err(|e| PumpError::file_io(self.path.clone(), "write frame", e))?;
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

    fn write_and_read(format: TextFormat, frame: &[u8]) -> String {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tcppump-text-test-{:?}-{}.txt", format, std::process::id()));
        {
            let mut backend = TextFileBackend::create(&path, format).unwrap();
            backend.write_frame(Duration::from_micros(2_000_001), frame).unwrap();
        }
        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        std::fs::remove_file(&path).ok();
        contents
    }

    #[test]
    fn text_format_has_packet_number_timestamp_and_spaced_hex() {
        let out = write_and_read(TextFormat::Text, &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(out, "    1\t2.000001\tde ad be ef\n");
    }

    #[test]
    fn hex_stream_has_no_separators() {
        let out = write_and_read(TextFormat::HexStream, &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(out, "deadbeef\n");
    }

    #[test]
    fn hex_dump_pads_short_final_row_and_renders_ascii_sidebar() {
        let mut frame = Vec::new();
        frame.extend_from_slice(b"Hello, world!!!!");
        frame.extend_from_slice(&[0x00, 0x01, 0xff]);
        let out = write_and_read(TextFormat::HexDump, &frame);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000 "));
        assert!(lines[0].ends_with("  Hello, world!!!!"));
        assert!(lines[1].starts_with("0010 "));
        assert!(lines[1].ends_with("  ..."));
    }
}
