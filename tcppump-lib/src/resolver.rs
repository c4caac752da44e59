use crate::address::{IpAddress, MacAddress};
use crate::error::{PumpError, Result};
use crate::frame::arp::ArpFrame;
use crate::frame::ethernet::EthernetFrame;
use crate::frame::EtherType;
use crate::item::{Item, ItemSequence};
use crate::netinterface::NetInterface;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Reads the destination IPv4 address straight out of an already-assembled
/// frame's IPv4 header (bytes 16..20 of the payload), so resolution doesn't
/// need the pre-assembly `Ipv4Params` kept around.
fn ipv4_dst(frame: &EthernetFrame) -> Option<IpAddress> {
    if frame.type_length() != EtherType::Ipv4.value() || frame.payload_length() < 20 {
        return None;
    }
    let o = &frame.payload()[16..20];
    Some(IpAddress::new(std::net::Ipv4Addr::new(o[0], o[1], o[2], o[3])))
}

/// A destination MAC of all zeroes is the Compiler's sentinel for "no
/// `dstmac` parameter was given, resolve it" (see `compiler::push_packet`).
fn needs_resolution(frame: &EthernetFrame) -> bool {
    frame.dest_mac() == MacAddress::zero() && ipv4_dst(frame).is_some()
}

/// Process-scoped, append-only mapping from IPv4 destination to resolved MAC.
/// Never evicts: the input's distinct destinations bound its size naturally.
#[derive(Debug, Default)]
pub struct ArpCache {
    entries: HashMap<IpAddress, MacAddress>,
}

impl ArpCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ip: IpAddress) -> Option<MacAddress> {
        self.entries.get(&ip).copied()
    }

    pub fn insert(&mut self, ip: IpAddress, mac: MacAddress) {
        self.entries.insert(ip, mac);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const ARP_TIMEOUT: Duration = Duration::from_secs(1);
const ARP_MAX_ATTEMPTS: u32 = 2;

/// Resolves an IPv4 address to a MAC address via the cache, falling back to
/// a raw ARP request/reply round trip with one retry on timeout.
pub struct Resolver {
    cache: ArpCache,
}

impl Resolver {
    pub fn new() -> Self {
        Self { cache: ArpCache::new() }
    }

    pub fn cache(&self) -> &ArpCache {
        &self.cache
    }

    /// Resolves `target` to a MAC address, consulting (and updating) the
    /// cache. `netif` provides the raw send/receive primitives; `own_mac`
    /// and `own_ip` identify us as the ARP requester.
    pub fn resolve(&mut self, netif: &mut dyn NetInterface, own_mac: MacAddress, own_ip: IpAddress, target: IpAddress) -> Result<MacAddress> {
        if let Some(mac) = self.cache.get(target) {
            return Ok(mac);
        }

        debug!(%target, "resolving MAC via ARP");
        let request = ArpFrame::who_has(own_mac, own_ip, target)?;

        for attempt in 0..ARP_MAX_ATTEMPTS {
            netif.send_packet(request.get(), None)?;

            let deadline = Instant::now() + ARP_TIMEOUT;
            let mut buf = [0u8; 128];
            loop {
                if Instant::now() >= deadline {
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                match netif.receive_packet(&mut buf, None, Some(remaining)) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Some(mac) = Self::parse_reply(&buf[..n], target) {
                            self.cache.insert(target, mac);
                            debug!(%target, mac = %mac, "resolved");
                            return Ok(mac);
                        }
                    }
                    Err(_) => break,
                }
            }
            if attempt + 1 < ARP_MAX_ATTEMPTS {
                warn!(%target, attempt, "ARP request timed out, retrying");
            }
        }

        Err(PumpError::Resolution(target.to_string()))
    }

    /// Runs once, after the Filter pass and before scheduling: resolves every
    /// IPv4-producing item still carrying the zero-MAC sentinel. A single
    /// unresolvable destination fails the whole run (§4.4: "the whole
    /// pipeline fails with 'could not resolve host(s)'").
    pub fn resolve_sequence(&mut self, netif: &mut dyn NetInterface, sequence: &mut ItemSequence, own_mac: MacAddress, own_ip: IpAddress) -> Result<()> {
        for item in sequence.iter_mut() {
            match item {
                Item::Frame { frame, .. } => {
                    if needs_resolution(frame) {
                        let dst_ip = ipv4_dst(frame).expect("checked by needs_resolution");
                        let mac = self.resolve(netif, own_mac, own_ip, dst_ip)?;
                        frame.set_dest_mac(mac);
                    }
                }
                Item::FragmentedPacket { fragments, .. } => {
                    if let Some(first) = fragments.first() {
                        if needs_resolution(first) {
                            let dst_ip = ipv4_dst(first).expect("checked by needs_resolution");
                            let mac = self.resolve(netif, own_mac, own_ip, dst_ip)?;
                            for fragment in fragments.iter_mut() {
                                fragment.set_dest_mac(mac);
                            }
                        }
                    }
                }
                Item::Wait { .. } | Item::Loop(_) | Item::Goto(_) => {}
            }
        }
        Ok(())
    }

    fn parse_reply(raw: &[u8], target: IpAddress) -> Option<MacAddress> {
        const MAC_HEADER_LEN: usize = 14;
        if raw.len() < MAC_HEADER_LEN + 2 {
            return None;
        }
        let ethertype = u16::from_be_bytes([raw[12], raw[13]]);
        if ethertype != crate::frame::EtherType::Arp.value() {
            return None;
        }
        let arp_payload = &raw[MAC_HEADER_LEN..];
        if arp_payload.len() < 28 {
            return None;
        }
        let opcode = u16::from_be_bytes([arp_payload[6], arp_payload[7]]);
        if opcode != 2 {
            return None;
        }
        let sender_ip = IpAddress::new(std::net::Ipv4Addr::new(arp_payload[14], arp_payload[15], arp_payload[16], arp_payload[17]));
        if sender_ip != target {
            return None;
        }
        let mut mac_bytes = [0u8; 6];
        mac_bytes.copy_from_slice(&arp_payload[8..14]);
        Some(MacAddress::from(mac_bytes))
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netinterface::SendStatistics;

    struct FakeInterface {
        replies: Vec<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    impl NetInterface for FakeInterface {
        fn open(&mut self, _send_only: bool) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
        fn send_packet(&mut self, bytes: &[u8], _send_time: Option<Duration>) -> Result<()> {
            self.sent.push(bytes.to_vec());
            Ok(())
        }
        fn prepare_send_queue(&mut self, _count: usize, _total_bytes: usize, _realtime: bool) -> Result<()> {
            Ok(())
        }
        fn flush_send_queue(&mut self) -> Result<()> {
            Ok(())
        }
        fn get_send_statistic(&self) -> SendStatistics {
            SendStatistics::default()
        }
        fn get_mac(&self) -> MacAddress {
            MacAddress::zero()
        }
        fn get_ipv4(&self) -> Option<IpAddress> {
            None
        }
        fn get_ipv6(&self) -> Option<crate::address::Ip6Address> {
            None
        }
        fn get_mtu(&self) -> usize {
            1500
        }
        fn receive_packet(&mut self, buf: &mut [u8], _bpf: Option<&dyn crate::bpf::BpfFilter>, _drop_before_timestamp: Option<Duration>) -> Result<usize> {
            match self.replies.pop() {
                Some(reply) => {
                    buf[..reply.len()].copy_from_slice(&reply);
                    Ok(reply.len())
                }
                None => Ok(0),
            }
        }
        fn add_receive_filter(&mut self, _bpf_text: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn resolve_sequence_patches_only_sentinel_destinations() {
        use crate::frame::ipv4::{build_frame, Ipv4Params};

        let own_mac: MacAddress = "00:00:00:00:00:01".parse().unwrap();
        let own_ip: IpAddress = "10.0.0.1".parse().unwrap();
        let target_ip: IpAddress = "10.0.0.2".parse().unwrap();
        let resolved_mac: MacAddress = "aa:aa:aa:aa:aa:aa".parse().unwrap();

        let params = Ipv4Params { src: own_ip, dst: target_ip, protocol: 17, ..Default::default() };
        let unresolved = build_frame(own_mac, MacAddress::zero(), &params, &[1, 2, 3]).unwrap();
        let already_set: MacAddress = "bb:bb:bb:bb:bb:bb".parse().unwrap();
        let pre_resolved = build_frame(own_mac, already_set, &params, &[4, 5, 6]).unwrap();

        let mut sequence = ItemSequence::new();
        sequence.push(Item::Frame { frame: unresolved, timestamp: Some(Duration::ZERO) });
        sequence.push(Item::Frame { frame: pre_resolved, timestamp: Some(Duration::ZERO) });

        let reply = ArpFrame::reply(resolved_mac, target_ip, own_mac, own_ip).unwrap();
        let mut netif = FakeInterface { replies: vec![reply.get().to_vec()], sent: Vec::new() };

        let mut resolver = Resolver::new();
        resolver.resolve_sequence(&mut netif, &mut sequence, own_mac, own_ip).unwrap();

        match sequence.get(0) {
            Some(Item::Frame { frame, .. }) => assert_eq!(frame.dest_mac(), resolved_mac),
            _ => panic!("expected a frame"),
        }
        match sequence.get(1) {
            Some(Item::Frame { frame, .. }) => assert_eq!(frame.dest_mac(), already_set),
            _ => panic!("expected a frame"),
        }
        assert_eq!(resolver.cache().get(target_ip), Some(resolved_mac));
    }

    #[test]
    fn cache_hit_never_consults_the_interface() {
        let mut resolver = Resolver::new();
        let target: IpAddress = "10.0.0.5".parse().unwrap();
        let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        resolver.cache.insert(target, mac);
        assert_eq!(resolver.cache().get(target), Some(mac));
    }

    #[test]
    fn parse_reply_rejects_mismatched_sender() {
        let request = ArpFrame::reply(
            "aa:aa:aa:aa:aa:aa".parse().unwrap(),
            "10.0.0.9".parse().unwrap(),
            "bb:bb:bb:bb:bb:bb".parse().unwrap(),
            "10.0.0.1".parse().unwrap(),
        )
        .unwrap();
        let target: IpAddress = "10.0.0.5".parse().unwrap();
        assert!(Resolver::parse_reply(request.get(), target).is_none());
    }

    #[test]
    fn parse_reply_accepts_matching_sender() {
        let request = ArpFrame::reply(
            "aa:aa:aa:aa:aa:aa".parse().unwrap(),
            "10.0.0.9".parse().unwrap(),
            "bb:bb:bb:bb:bb:bb".parse().unwrap(),
            "10.0.0.1".parse().unwrap(),
        )
        .unwrap();
        let target: IpAddress = "10.0.0.9".parse().unwrap();
        assert_eq!(Resolver::parse_reply(request.get(), target), Some("aa:aa:aa:aa:aa:aa".parse().unwrap()));
    }
}
