use crate::address::MacAddress;
use crate::item::{Item, ItemSequence};
use tracing::debug;

/// Runs once before scheduling: if a forced destination MAC is configured,
/// overwrites every Frame's and FragmentedPacket's destination MAC.
///
/// Source/destination drop filters are a reserved hook (see the original's
/// `dropDMAC`/`dropSMAC` constructor parameters) but are not required by any
/// v1 operation, so they are not modeled as fields here.
pub struct Filter {
    forced_dmac: Option<MacAddress>,
}

impl Filter {
    pub fn new(forced_dmac: Option<MacAddress>) -> Self {
        Self { forced_dmac }
    }

    pub fn apply(&self, sequence: &mut ItemSequence) {
        let Some(dmac) = self.forced_dmac else { return };
        debug!(dmac = %dmac, "filtering");

        for item in sequence.iter_mut() {
            match item {
                Item::Frame { frame, .. } => {
                    let src = frame.src_mac();
                    frame.set_mac_header(src, dmac);
                }
                Item::FragmentedPacket { fragments, .. } => {
                    for frame in fragments {
                        let src = frame.src_mac();
                        frame.set_mac_header(src, dmac);
                    }
                }
                Item::Wait { .. } | Item::Loop(_) | Item::Goto(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ethernet::{EthernetFrame, MAX_PACKET};
    use std::time::Duration;

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    #[test]
    fn overwrites_destination_mac_of_frames() {
        let mut frame = EthernetFrame::new(MAX_PACKET);
        frame.set_mac_header(mac("00:00:00:00:00:01"), mac("00:00:00:00:00:02"));
        let mut seq = ItemSequence::new();
        seq.push(Item::Frame { frame, timestamp: Some(Duration::ZERO) });

        Filter::new(Some(mac("ff:ff:ff:ff:ff:ff"))).apply(&mut seq);

        if let Some(Item::Frame { frame, .. }) = seq.get(0) {
            assert_eq!(frame.dest_mac(), mac("ff:ff:ff:ff:ff:ff"));
            assert_eq!(frame.src_mac(), mac("00:00:00:00:00:01"));
        } else {
            panic!("expected a frame");
        }
    }

    #[test]
    fn no_forced_mac_leaves_frames_untouched() {
        let mut frame = EthernetFrame::new(MAX_PACKET);
        frame.set_mac_header(mac("00:00:00:00:00:01"), mac("00:00:00:00:00:02"));
        let mut seq = ItemSequence::new();
        seq.push(Item::Frame { frame, timestamp: Some(Duration::ZERO) });

        Filter::new(None).apply(&mut seq);

        if let Some(Item::Frame { frame, .. }) = seq.get(0) {
            assert_eq!(frame.dest_mac(), mac("00:00:00:00:00:02"));
        } else {
            panic!("expected a frame");
        }
    }
}
