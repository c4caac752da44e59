use crate::address::MacAddress;
use crate::error::{PumpError, Result};
use byteorder::{BigEndian, ByteOrder};

/// Well-known ethertype/length values used when building frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EtherType {
    Ipv4 = 0x0800,
    Arp = 0x0806,
    CVlan = 0x8100,
    Ipv6 = 0x86dd,
    SVlan = 0x88a8,
    ProfiNet = 0x8892,
}

impl EtherType {
    pub fn value(self) -> u16 {
        self as u16
    }
}

const MAC_HEADER_LEN: usize = 6 + 6 + 2;
const VLAN_TAG_LEN: usize = 4;
pub const MAX_ETHERNET_PAYLOAD: usize = 1500;
pub const MAX_PACKET: usize = MAC_HEADER_LEN + MAX_ETHERNET_PAYLOAD;
pub const MAX_TAGGED_PACKET: usize = MAX_PACKET + VLAN_TAG_LEN;
pub const MAX_DOUBLE_TAGGED_PACKET: usize = MAX_TAGGED_PACKET + VLAN_TAG_LEN;

/// A growable Ethernet frame buffer.
///
/// Mirrors the original's pointer-pair invariant (`pPayload` /
/// `pEthertypeLength` shift together as headers are inserted) using byte
/// offsets into an owned buffer instead of raw pointers.
#[derive(Debug, Clone)]
pub struct EthernetFrame {
    buf: Vec<u8>,
    max_length: usize,
    payload_offset: usize,
    ethertype_offset: usize,
    payload_length: usize,
    llc_header_length: usize,
    vlan_tags: u32,
}

impl EthernetFrame {
    pub fn new(max_length: usize) -> Self {
        let mut buf = vec![0u8; max_length.max(MAC_HEADER_LEN)];
        buf.truncate(MAC_HEADER_LEN);
        Self {
            buf,
            max_length,
            payload_offset: MAC_HEADER_LEN,
            ethertype_offset: 12,
            payload_length: 0,
            llc_header_length: 0,
            vlan_tags: 0,
        }
    }

    /// A frame sized for the worst case: two VLAN tags plus the maximum payload.
    pub fn with_default_capacity() -> Self {
        Self::new(MAX_DOUBLE_TAGGED_PACKET)
    }

    pub fn reset(&mut self) {
        self.buf.truncate(MAC_HEADER_LEN);
        self.buf.resize(MAC_HEADER_LEN, 0);
        self.payload_offset = MAC_HEADER_LEN;
        self.ethertype_offset = 12;
        self.payload_length = 0;
        self.llc_header_length = 0;
        self.vlan_tags = 0;
    }

    fn check_capacity(&self, added: usize) -> Result<()> {
        if self.len() + added > self.max_length {
            return Err(PumpError::Overflow(format!(
                "frame would grow to {} bytes, exceeding the {}-byte limit",
                self.len() + added,
                self.max_length
            )));
        }
        Ok(())
    }

    pub fn set_mac_header(&mut self, src: MacAddress, dest: MacAddress) {
        self.set_dest_mac(dest);
        self.set_src_mac(src);
    }

    pub fn set_dest_mac(&mut self, dest: MacAddress) {
        self.buf[0..6].copy_from_slice(dest.bytes());
    }

    pub fn set_src_mac(&mut self, src: MacAddress) {
        self.buf[6..12].copy_from_slice(src.bytes());
    }

    pub fn src_mac(&self) -> MacAddress {
        let mut b = [0u8; 6];
        b.copy_from_slice(&self.buf[6..12]);
        MacAddress::from(b)
    }

    pub fn dest_mac(&self) -> MacAddress {
        let mut b = [0u8; 6];
        b.copy_from_slice(&self.buf[0..6]);
        MacAddress::from(b)
    }

    pub fn set_type_length(&mut self, ethertype_length: u16) {
        BigEndian::write_u16(&mut self.buf[self.ethertype_offset..self.ethertype_offset + 2], ethertype_length);
    }

    pub fn type_length(&self) -> u16 {
        BigEndian::read_u16(&self.buf[self.ethertype_offset..self.ethertype_offset + 2])
    }

    /// Recomputes the ethertype/length field from payload + LLC header size,
    /// the way the 802.3 length field is defined.
    pub fn set_length(&mut self) {
        let len = (self.payload_length + self.llc_header_length) as u16;
        self.set_type_length(len);
    }

    /// Inserts a VLAN tag directly in front of the ethertype/length field,
    /// shifting everything after it (ethertype + payload) down by 4 bytes.
    pub fn add_vlan_tag(&mut self, is_c_tag: bool, id: u16, prio: u16, dei: u16) -> Result<()> {
        self.check_capacity(VLAN_TAG_LEN)?;

        let tpid = if is_c_tag { EtherType::CVlan.value() } else { EtherType::SVlan.value() };
        let tci = (id & 0x0fff) | ((dei & 1) << 12) | ((prio & 7) << 13);

        let insert_at = self.ethertype_offset;
        let tail_len = self.buf.len() - insert_at;
        self.buf.resize(self.buf.len() + VLAN_TAG_LEN, 0);
        self.buf.copy_within(insert_at..insert_at + tail_len, insert_at + VLAN_TAG_LEN);

        BigEndian::write_u16(&mut self.buf[insert_at..insert_at + 2], tpid);
        BigEndian::write_u16(&mut self.buf[insert_at + 2..insert_at + 4], tci);

        self.ethertype_offset += VLAN_TAG_LEN;
        self.payload_offset += VLAN_TAG_LEN;
        self.vlan_tags += 1;
        Ok(())
    }

    pub fn vlan_tag_count(&self) -> u32 {
        self.vlan_tags
    }

    /// Inserts an 802.2 LLC header in front of the current payload. `control`
    /// determines an 8-bit (unnumbered, low two bits == `11`) or 16-bit
    /// control field, per 802.2.
    pub fn add_llc_header(&mut self, dsap: u8, ssap: u8, control: u16) -> Result<()> {
        let ctrl_len = if control & 0x0003 == 3 { 1 } else { 2 };
        let added = 2 + ctrl_len;
        self.check_capacity(added)?;

        let insert_at = self.payload_offset;
        if self.payload_length > 0 {
            self.buf.resize(self.buf.len() + added, 0);
            self.buf.copy_within(insert_at..insert_at + self.payload_length, insert_at + added);
        } else {
            self.buf.resize(self.buf.len() + added, 0);
        }

        self.buf[insert_at] = dsap;
        self.buf[insert_at + 1] = ssap;
        if ctrl_len == 1 {
            self.buf[insert_at + 2] = control as u8;
        } else {
            BigEndian::write_u16(&mut self.buf[insert_at + 2..insert_at + 4], control);
        }

        self.llc_header_length = added;
        self.payload_offset += added;
        self.set_length();
        Ok(())
    }

    /// Inserts a SNAP header (always preceded by an LLC 0xAA/0xAA/0x03 header).
    pub fn add_snap_header(&mut self, oui: u32, protocol: u16) -> Result<()> {
        self.add_llc_header(0xaa, 0xaa, 3)?;

        const SNAP_LEN: usize = 5;
        self.check_capacity(SNAP_LEN)?;

        let insert_at = self.payload_offset;
        if self.payload_length > 0 {
            self.buf.resize(self.buf.len() + SNAP_LEN, 0);
            self.buf.copy_within(insert_at..insert_at + self.payload_length, insert_at + SNAP_LEN);
        } else {
            self.buf.resize(self.buf.len() + SNAP_LEN, 0);
        }

        self.buf[insert_at] = ((oui >> 16) & 0xff) as u8;
        self.buf[insert_at + 1] = ((oui >> 8) & 0xff) as u8;
        self.buf[insert_at + 2] = (oui & 0xff) as u8;
        BigEndian::write_u16(&mut self.buf[insert_at + 3..insert_at + 5], protocol);

        self.llc_header_length += SNAP_LEN;
        self.payload_offset += SNAP_LEN;
        self.set_length();
        Ok(())
    }

    pub fn set_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.check_capacity(payload.len().saturating_sub(self.payload_length))?;
        let start = self.payload_offset;
        self.buf.truncate(start);
        self.buf.extend_from_slice(payload);
        self.payload_length = payload.len();
        Ok(())
    }

    pub fn append_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.check_capacity(payload.len())?;
        self.buf.extend_from_slice(payload);
        self.payload_length += payload.len();
        Ok(())
    }

    /// Overwrites `len` bytes of the existing payload at `offset`, without
    /// changing its length. Used when header fields (checksums, fragment
    /// flags) are patched in after the payload was already written.
    pub fn update_payload_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if offset + data.len() > self.payload_length {
            return Err(PumpError::ParamRange {
                name: "payload offset".into(),
                found: format!("{offset}+{} > {}", data.len(), self.payload_length),
            });
        }
        let start = self.payload_offset + offset;
        self.buf[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn set_raw(&mut self, raw: &[u8]) -> Result<()> {
        if raw.len() > self.max_length {
            return Err(PumpError::Overflow(format!(
                "raw frame of {} bytes exceeds the {}-byte limit",
                raw.len(),
                self.max_length
            )));
        }
        if raw.len() < MAC_HEADER_LEN {
            return Err(PumpError::ParamRange {
                name: "raw frame".into(),
                found: format!("{} bytes is shorter than an Ethernet header", raw.len()),
            });
        }
        self.reset();
        self.buf.truncate(MAC_HEADER_LEN);
        self.buf.extend_from_slice(&raw[MAC_HEADER_LEN..]);
        self.buf[0..MAC_HEADER_LEN].copy_from_slice(&raw[0..MAC_HEADER_LEN]);
        self.payload_length = raw.len() - MAC_HEADER_LEN;
        Ok(())
    }

    pub fn get(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn has_llc_header(&self) -> bool {
        self.llc_header_length != 0
    }

    pub fn has_payload(&self) -> bool {
        self.payload_length != 0
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[self.payload_offset..self.payload_offset + self.payload_length]
    }

    pub fn payload_length(&self) -> usize {
        self.payload_length
    }

    pub fn mtu(&self) -> usize {
        self.max_length - self.payload_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    #[test]
    fn mac_header_and_vlan_and_payload_match_reference_bytes() {
        let mut f = EthernetFrame::new(MAX_DOUBLE_TAGGED_PACKET);
        f.set_mac_header(mac("12:34:56:78:9a:bc"), mac("11:22:33:44:55:66"));
        assert_eq!(
            &f.get()[0..14],
            &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0x00, 0x00]
        );
        assert_eq!(f.len(), 14);

        f.set_type_length(0x1234);
        assert_eq!(&f.get()[12..14], &[0x12, 0x34]);

        f.add_vlan_tag(false, 12, 7, 0).unwrap();
        assert_eq!(
            f.get(),
            &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0x88, 0xa8, 0xe0, 0x0c, 0x12, 0x34][..]
        );
        assert_eq!(f.len(), 18);

        f.set_payload(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f]).unwrap();
        assert_eq!(f.len(), 30);

        f.add_vlan_tag(true, 12, 7, 0).unwrap();
        assert_eq!(f.len(), 34);
        f.set_length();
        assert_eq!(
            &f.get()[12..22],
            &[0x88, 0xa8, 0xe0, 0x0c, 0x81, 0x00, 0xe0, 0x0c, 0x00, 0x0c]
        );

        f.add_llc_header(0x10, 0x20, 3).unwrap();
        assert_eq!(f.len(), 37);
    }

    #[test]
    fn snap_header_matches_reference_bytes() {
        let mut f = EthernetFrame::new(MAX_DOUBLE_TAGGED_PACKET);
        f.set_mac_header(mac("12:34:56:78:9a:bc"), mac("11:22:33:44:55:66"));
        f.add_snap_header(0x00808182, 0x9876).unwrap();
        assert_eq!(
            f.get(),
            &[
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0x00, 0x08, 0xaa, 0xaa, 0x03,
                0x80, 0x81, 0x82, 0x98, 0x76
            ][..]
        );
        assert_eq!(f.len(), 22);
    }

    #[test]
    fn vlan_tag_fits_exactly_but_not_one_byte_less() {
        let mut ok = EthernetFrame::new(MAC_HEADER_LEN + VLAN_TAG_LEN);
        assert!(ok.add_vlan_tag(false, 12, 7, 0).is_ok());

        let mut too_small = EthernetFrame::new(MAC_HEADER_LEN + VLAN_TAG_LEN - 1);
        assert!(too_small.add_vlan_tag(false, 12, 7, 0).is_err());
    }

    #[test]
    fn append_payload_accumulates_length() {
        let mut f = EthernetFrame::new(MAX_PACKET);
        f.append_payload(&[1, 2, 3]).unwrap();
        f.append_payload(&[4, 5]).unwrap();
        assert_eq!(f.payload(), &[1, 2, 3, 4, 5]);
        assert_eq!(f.payload_length(), 5);
    }

    #[test]
    fn update_payload_at_rejects_out_of_range() {
        let mut f = EthernetFrame::new(MAX_PACKET);
        f.set_payload(&[0; 4]).unwrap();
        assert!(f.update_payload_at(2, &[0xff, 0xff]).is_ok());
        assert!(f.update_payload_at(3, &[0xff, 0xff]).is_err());
    }
}
