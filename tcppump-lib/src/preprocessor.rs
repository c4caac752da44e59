use crate::frame::ethernet::EthernetFrame;
use crate::rng::Rng;

/// Runs per-frame at emission time: replaces source and/or destination MAC
/// with a freshly generated random address, when enabled. A no-op pass when
/// both flags are off.
pub struct Preprocessor {
    random_src_mac: bool,
    random_dst_mac: bool,
}

impl Preprocessor {
    pub fn new(random_src_mac: bool, random_dst_mac: bool) -> Self {
        Self { random_src_mac, random_dst_mac }
    }

    pub fn is_noop(&self) -> bool {
        !self.random_src_mac && !self.random_dst_mac
    }

    pub fn apply(&self, frame: &mut EthernetFrame, rng: &mut dyn Rng) {
        if self.random_src_mac {
            let mac = crate::address::MacAddress::random(rng, true, true);
            let dst = frame.dest_mac();
            frame.set_mac_header(mac, dst);
        }
        if self.random_dst_mac {
            let mac = crate::address::MacAddress::random(rng, true, true);
            let src = frame.src_mac();
            frame.set_mac_header(src, mac);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ethernet::MAX_PACKET;
    use crate::rng::PredictableRng;

    #[test]
    fn noop_when_both_flags_off() {
        let p = Preprocessor::new(false, false);
        assert!(p.is_noop());
    }

    #[test]
    fn randomizes_requested_fields_only() {
        let mut frame = EthernetFrame::new(MAX_PACKET);
        let original_src: crate::address::MacAddress = "00:00:00:00:00:01".parse().unwrap();
        let original_dst: crate::address::MacAddress = "00:00:00:00:00:02".parse().unwrap();
        frame.set_mac_header(original_src, original_dst);

        let mut rng = PredictableRng::new();
        Preprocessor::new(true, false).apply(&mut frame, &mut rng);
        assert_ne!(frame.src_mac(), original_src);
        assert_eq!(frame.dest_mac(), original_dst);
    }
}
