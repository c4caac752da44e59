use super::ethernet::{EtherType, EthernetFrame, MAX_PACKET};
use crate::address::{IpAddress, MacAddress};
use crate::error::Result;
use byteorder::{BigEndian, ByteOrder};

pub const ARP_PAYLOAD_LEN: usize = 2 + 2 + 1 + 1 + 2 + 6 + 4 + 6 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ArpOpcode {
    Request = 1,
    Reply = 2,
}

/// An ARP request/reply frame, built directly into an `EthernetFrame`.
pub struct ArpFrame;

impl ArpFrame {
    /// A standard ARP request: "who has `ip`? tell `src_ip`".
    pub fn who_has(src_mac: MacAddress, src_ip: IpAddress, ip: IpAddress) -> Result<EthernetFrame> {
        Self::build(ArpOpcode::Request, src_mac, src_ip, MacAddress::zero(), ip)
    }

    /// An ARP probe: a request with a zero sender IP, used to check for
    /// address conflicts without revealing our own address (RFC 5227).
    pub fn probe(src_mac: MacAddress, ip: IpAddress) -> Result<EthernetFrame> {
        Self::build(ArpOpcode::Request, src_mac, IpAddress::new(std::net::Ipv4Addr::UNSPECIFIED), MacAddress::zero(), ip)
    }

    /// A gratuitous ARP announcement: sender and target IP are the same.
    pub fn announce(src_mac: MacAddress, ip: IpAddress) -> Result<EthernetFrame> {
        Self::build(ArpOpcode::Request, src_mac, ip, MacAddress::zero(), ip)
    }

    pub fn reply(src_mac: MacAddress, src_ip: IpAddress, dst_mac: MacAddress, dst_ip: IpAddress) -> Result<EthernetFrame> {
        Self::build(ArpOpcode::Reply, src_mac, src_ip, dst_mac, dst_ip)
    }

    fn build(opcode: ArpOpcode, src_mac: MacAddress, src_ip: IpAddress, dst_mac: MacAddress, dst_ip: IpAddress) -> Result<EthernetFrame> {
        let mut payload = [0u8; ARP_PAYLOAD_LEN];
        BigEndian::write_u16(&mut payload[0..2], 1); // hardware type: Ethernet
        BigEndian::write_u16(&mut payload[2..4], EtherType::Ipv4.value());
        payload[4] = 6; // hw addr size
        payload[5] = 4; // proto addr size
        BigEndian::write_u16(&mut payload[6..8], opcode as u16);
        payload[8..14].copy_from_slice(src_mac.bytes());
        payload[14..18].copy_from_slice(&src_ip.octets());
        let resolved_dst = if dst_mac.bytes() == &[0u8; 6] { MacAddress::BROADCAST } else { dst_mac };
        payload[18..24].copy_from_slice(resolved_dst.bytes());
        payload[24..28].copy_from_slice(&dst_ip.octets());

        let mut frame = EthernetFrame::new(MAX_PACKET);
        frame.set_mac_header(src_mac, resolved_dst);
        frame.set_type_length(EtherType::Arp.value());
        frame.set_payload(&payload)?;
        Ok(frame)
    }

    pub fn is_request(frame: &EthernetFrame) -> bool {
        frame.payload_length() >= 8 && BigEndian::read_u16(&frame.payload()[6..8]) == ArpOpcode::Request as u16
    }

    pub fn is_reply(frame: &EthernetFrame) -> bool {
        frame.payload_length() >= 8 && BigEndian::read_u16(&frame.payload()[6..8]) == ArpOpcode::Reply as u16
    }

    pub fn sender_mac(frame: &EthernetFrame) -> MacAddress {
        let mut b = [0u8; 6];
        b.copy_from_slice(&frame.payload()[8..14]);
        MacAddress::from(b)
    }

    pub fn sender_ip(frame: &EthernetFrame) -> IpAddress {
        let o = &frame.payload()[14..18];
        IpAddress::new(std::net::Ipv4Addr::new(o[0], o[1], o[2], o[3]))
    }

    pub fn target_ip(frame: &EthernetFrame) -> IpAddress {
        let o = &frame.payload()[24..28];
        IpAddress::new(std::net::Ipv4Addr::new(o[0], o[1], o[2], o[3]))
    }
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
    fn who_has_broadcasts_and_carries_zero_target_mac() {
        let f = ArpFrame::who_has(mac("12:34:56:78:9a:bc"), ip("10.0.0.1"), ip("10.0.0.2")).unwrap();
        assert_eq!(f.dest_mac(), MacAddress::BROADCAST);
        assert!(ArpFrame::is_request(&f));
        assert_eq!(ArpFrame::sender_ip(&f), ip("10.0.0.1"));
        assert_eq!(ArpFrame::target_ip(&f), ip("10.0.0.2"));
    }

    #[test]
    fn announce_uses_same_ip_for_sender_and_target() {
        let f = ArpFrame::announce(mac("00:11:22:33:44:55"), ip("192.168.0.5")).unwrap();
        assert_eq!(ArpFrame::sender_ip(&f), ip("192.168.0.5"));
        assert_eq!(ArpFrame::target_ip(&f), ip("192.168.0.5"));
    }

    #[test]
    fn reply_addresses_the_requester_directly() {
        let f = ArpFrame::reply(mac("aa:aa:aa:aa:aa:aa"), ip("10.0.0.2"), mac("bb:bb:bb:bb:bb:bb"), ip("10.0.0.1")).unwrap();
        assert!(ArpFrame::is_reply(&f));
        assert_eq!(f.dest_mac(), mac("bb:bb:bb:bb:bb:bb"));
    }
}
