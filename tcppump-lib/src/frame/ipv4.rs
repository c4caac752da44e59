use super::ethernet::{EtherType, EthernetFrame, MAX_PACKET};
use crate::address::{IpAddress, MacAddress};
use crate::error::{PumpError, Result};
use byteorder::{BigEndian, ByteOrder};

const IP_HEADER_LEN: usize = 20;
const FLAG_MF: u16 = 0x2000;
const FLAG_DF: u16 = 0x4000;
const FRAGMENT_OFFSET_UNIT: usize = 8;

/// Parameters for an IPv4 packet, before fragmentation is decided.
#[derive(Debug, Clone)]
pub struct Ipv4Params {
    pub src: IpAddress,
    pub dst: IpAddress,
    pub protocol: u8,
    pub ttl: u8,
    pub tos: u8,
    pub dont_fragment: bool,
    pub identification: u16,
}

impl Default for Ipv4Params {
    fn default() -> Self {
        Self {
            src: IpAddress::new(std::net::Ipv4Addr::UNSPECIFIED),
            dst: IpAddress::new(std::net::Ipv4Addr::UNSPECIFIED),
            protocol: 0,
            ttl: 64,
            tos: 0,
            dont_fragment: false,
            identification: 0,
        }
    }
}

fn checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for chunk in header.chunks(2) {
        let word = if chunk.len() == 2 {
            BigEndian::read_u16(chunk) as u32
        } else {
            (chunk[0] as u32) << 8
        };
        sum += word;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

fn write_header(
    buf: &mut [u8],
    params: &Ipv4Params,
    total_length: u16,
    fragment_offset_units: u16,
    more_fragments: bool,
) {
    buf[0] = 0x45; // version 4, IHL 5 (no options)
    buf[1] = params.tos;
    BigEndian::write_u16(&mut buf[2..4], total_length);
    BigEndian::write_u16(&mut buf[4..6], params.identification);
    let mut flags_offset = fragment_offset_units & 0x1fff;
    if more_fragments {
        flags_offset |= FLAG_MF;
    }
    if params.dont_fragment {
        flags_offset |= FLAG_DF;
    }
    BigEndian::write_u16(&mut buf[6..8], flags_offset);
    buf[8] = params.ttl;
    buf[9] = params.protocol;
    BigEndian::write_u16(&mut buf[10..12], 0); // checksum placeholder
    buf[12..16].copy_from_slice(&params.src.octets());
    buf[16..20].copy_from_slice(&params.dst.octets());
    let csum = checksum(&buf[0..20]);
    BigEndian::write_u16(&mut buf[10..12], csum);
}

/// Builds a single, unfragmented IPv4 packet wrapped in an Ethernet frame.
pub fn build_frame(src_mac: MacAddress, dst_mac: MacAddress, params: &Ipv4Params, payload: &[u8]) -> Result<EthernetFrame> {
    if IP_HEADER_LEN + payload.len() > u16::MAX as usize {
        return Err(PumpError::ParamRange { name: "ipv4 payload".into(), found: format!("{} bytes", payload.len()) });
    }
    let mut header = [0u8; IP_HEADER_LEN];
    write_header(&mut header, params, (IP_HEADER_LEN + payload.len()) as u16, 0, false);

    let mut frame = EthernetFrame::new(MAX_PACKET);
    frame.set_mac_header(src_mac, dst_mac);
    frame.set_type_length(EtherType::Ipv4.value());
    frame.set_payload(&header)?;
    frame.append_payload(payload)?;
    Ok(frame)
}

/// Splits `payload` into IPv4 fragments that fit within `mtu` (the Ethernet
/// MTU, i.e. the IPv4 total length budget). Returns one Ethernet frame per
/// fragment, in ascending offset order; only the last carries MF=0.
///
/// `df` must be false — callers check `dont_fragment` and report a
/// resolution/overflow failure themselves before calling this when a
/// payload both exceeds the MTU and forbids fragmentation.
pub fn fragment(
    src_mac: MacAddress,
    dst_mac: MacAddress,
    params: &Ipv4Params,
    payload: &[u8],
    mtu: usize,
) -> Result<Vec<EthernetFrame>> {
    if params.dont_fragment {
        return Err(PumpError::Overflow(format!(
            "IPv4 payload of {} bytes exceeds MTU {mtu} and DF is set",
            payload.len()
        )));
    }
    if mtu <= IP_HEADER_LEN {
        return Err(PumpError::ParamRange { name: "mtu".into(), found: mtu.to_string() });
    }

    let max_fragment_payload = ((mtu - IP_HEADER_LEN) / FRAGMENT_OFFSET_UNIT) * FRAGMENT_OFFSET_UNIT;
    if max_fragment_payload == 0 {
        return Err(PumpError::ParamRange { name: "mtu".into(), found: mtu.to_string() });
    }

    let mut frames = Vec::new();
    let mut consumed = 0usize;
    while consumed < payload.len() {
        let remaining = payload.len() - consumed;
        let this_len = remaining.min(max_fragment_payload);
        let more = consumed + this_len < payload.len();
        let offset_units = (consumed / FRAGMENT_OFFSET_UNIT) as u16;

        let mut header = [0u8; IP_HEADER_LEN];
        write_header(&mut header, params, (IP_HEADER_LEN + this_len) as u16, offset_units, more);

        let mut frame = EthernetFrame::new(MAX_PACKET);
        frame.set_mac_header(src_mac, dst_mac);
        frame.set_type_length(EtherType::Ipv4.value());
        frame.set_payload(&header)?;
        frame.append_payload(&payload[consumed..consumed + this_len])?;
        frames.push(frame);

        consumed += this_len;
    }
    Ok(frames)
}

/// Returns the wire-layout fragment offset (in 8-byte units) and MF flag
/// encoded at byte 6..8 of an IPv4 header, for tests and diagnostics.
pub fn decode_flags_offset(header: &[u8]) -> (u16, bool) {
    let v = BigEndian::read_u16(&header[6..8]);
    (v & 0x1fff, v & FLAG_MF != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }
    fn ip(s: &str) -> IpAddress {
        s.parse().unwrap()
    }

    #[test]
    fn unfragmented_packet_has_correct_checksum_and_length() {
        let params = Ipv4Params { src: ip("10.0.0.1"), dst: ip("10.0.0.2"), protocol: 17, ..Default::default() };
        let frame = build_frame(mac("00:00:00:00:00:01"), mac("00:00:00:00:00:02"), &params, &[1, 2, 3, 4]).unwrap();
        let header = &frame.payload()[0..IP_HEADER_LEN];
        assert_eq!(BigEndian::read_u16(&header[2..4]), 24);
        assert_eq!(checksum(header), 0);
    }

    #[test]
    fn fragments_3000_bytes_over_mtu_1500_into_three_pieces() {
        let params = Ipv4Params { src: ip("10.0.0.1"), dst: ip("10.0.0.2"), protocol: 17, ..Default::default() };
        let payload = vec![0xabu8; 3000];
        let frames = fragment(mac("00:00:00:00:00:01"), mac("00:00:00:00:00:02"), &params, &payload, 1500).unwrap();
        assert_eq!(frames.len(), 3);

        let mut offsets = Vec::new();
        let mut mfs = Vec::new();
        let mut total_payload = 0usize;
        for f in &frames {
            let header = &f.payload()[0..IP_HEADER_LEN];
            let (offset, mf) = decode_flags_offset(header);
            offsets.push(offset);
            mfs.push(mf);
            total_payload += f.payload_length() - IP_HEADER_LEN;
        }

        assert_eq!(offsets, vec![0, 185, 370]);
        assert_eq!(mfs, vec![true, true, false]);
        assert_eq!(total_payload, 3000);
    }

    #[test]
    fn df_over_mtu_is_an_error() {
        let params = Ipv4Params { dont_fragment: true, ..Default::default() };
        let payload = vec![0u8; 3000];
        assert!(fragment(mac("00:00:00:00:00:01"), mac("00:00:00:00:00:02"), &params, &payload, 1500).is_err());
    }
}
