use super::ethernet::{EthernetFrame, MAX_PACKET};
use crate::address::MacAddress;
use crate::error::Result;
use byteorder::{BigEndian, ByteOrder};

const STP_DEST_MAC: MacAddress = MacAddress::new([0x01, 0x80, 0xc2, 0x00, 0x00, 0x00]);

/// Bits of the STP/RSTP flags byte, settable independently of BPDU kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct StpFlags {
    pub topology_change: bool,
    pub topology_change_ack: bool,
    pub proposal: bool,
    pub learning: bool,
    pub forwarding: bool,
    pub agreement: bool,
    pub port_role: u8,
}

/// A bridge/root identifier: 4-bit priority, 12-bit system ID extension, MAC.
#[derive(Debug, Clone, Copy)]
pub struct BridgeId {
    pub priority: u8,
    pub system_id_ext: u16,
    pub mac: MacAddress,
}

fn write_bridge_id(buf: &mut [u8], id: &BridgeId) {
    let prio_ext = (((id.priority & 0x0f) as u16) << 12) | (id.system_id_ext & 0x0fff);
    BigEndian::write_u16(&mut buf[0..2], prio_ext);
    buf[2..8].copy_from_slice(id.mac.bytes());
}

fn to_time_units(seconds: f64) -> u16 {
    (seconds * 256.0) as u16
}

fn mac_header_and_llc(src_mac: MacAddress) -> Result<EthernetFrame> {
    let mut frame = EthernetFrame::new(MAX_PACKET);
    frame.set_mac_header(src_mac, STP_DEST_MAC);
    frame.add_llc_header(0x42, 0x42, 3)?;
    Ok(frame)
}

fn write_common_config_fields(
    buf: &mut [u8],
    root: &BridgeId,
    root_path_cost: u32,
    bridge: &BridgeId,
    port_priority: u8,
    port_number: u16,
    message_age: f64,
    max_age: f64,
    hello_time: f64,
    forward_delay: f64,
    flags: StpFlags,
) {
    BigEndian::write_u16(&mut buf[0..2], 0); // protocol id: IEEE 802.1D
    buf[2] = 0; // version, overwritten by RSTP builder
    buf[3] = 0; // BPDU type, overwritten by RSTP builder
    let flag_byte = ((flags.topology_change_ack as u8) << 7) | (flags.topology_change as u8);
    buf[4] = flag_byte;
    write_bridge_id(&mut buf[5..13], root);
    BigEndian::write_u32(&mut buf[13..17], root_path_cost);
    write_bridge_id(&mut buf[17..25], bridge);
    let port_id = (((port_priority & 0x0f) as u16) << 12) | (port_number & 0x0fff);
    BigEndian::write_u16(&mut buf[25..27], port_id);
    BigEndian::write_u16(&mut buf[27..29], to_time_units(message_age));
    BigEndian::write_u16(&mut buf[29..31], to_time_units(max_age));
    BigEndian::write_u16(&mut buf[31..33], to_time_units(hello_time));
    BigEndian::write_u16(&mut buf[33..35], to_time_units(forward_delay));
}

/// Builds a classic (802.1D) STP Configuration BPDU.
#[allow(clippy::too_many_arguments)]
pub fn config_bpdu(
    src_mac: MacAddress,
    root: &BridgeId,
    root_path_cost: u32,
    bridge: &BridgeId,
    port_priority: u8,
    port_number: u16,
    message_age: f64,
    max_age: f64,
    hello_time: f64,
    forward_delay: f64,
    flags: StpFlags,
) -> Result<EthernetFrame> {
    let mut frame = mac_header_and_llc(src_mac)?;

    let mut bpdu = [0u8; 35];
    write_common_config_fields(&mut bpdu, root, root_path_cost, bridge, port_priority, port_number, message_age, max_age, hello_time, forward_delay, flags);
    // protocol=0, version=0, type=0 for plain STP config — already zeroed.

    frame.set_payload(&bpdu)?;
    frame.set_length();
    Ok(frame)
}

/// Builds a Rapid Spanning Tree (802.1w) Configuration BPDU: the STP config
/// fields followed by a zero "Version 1 Length" byte, with version/type set
/// to the RSTP constants and the RSTP flag bits populated.
#[allow(clippy::too_many_arguments)]
pub fn rstp_config_bpdu(
    src_mac: MacAddress,
    root: &BridgeId,
    root_path_cost: u32,
    bridge: &BridgeId,
    port_priority: u8,
    port_number: u16,
    message_age: f64,
    max_age: f64,
    hello_time: f64,
    forward_delay: f64,
    flags: StpFlags,
) -> Result<EthernetFrame> {
    let mut frame = mac_header_and_llc(src_mac)?;

    let mut bpdu = [0u8; 36];
    write_common_config_fields(&mut bpdu[0..35], root, root_path_cost, bridge, port_priority, port_number, message_age, max_age, hello_time, forward_delay, flags);
    bpdu[2] = 2; // version: RST
    bpdu[3] = 2; // type: RST/MST config
    let rstp_bits = ((flags.agreement as u8) << 6)
        | ((flags.forwarding as u8) << 5)
        | ((flags.learning as u8) << 4)
        | ((flags.port_role & 3) << 2)
        | ((flags.proposal as u8) << 1);
    bpdu[4] |= rstp_bits;
    bpdu[35] = 0; // version 1 length

    frame.set_payload(&bpdu)?;
    frame.set_length();
    Ok(frame)
}

/// Builds a Topology Change Notification BPDU (protocol/version/type only).
pub fn tcn_bpdu(src_mac: MacAddress) -> Result<EthernetFrame> {
    let mut frame = mac_header_and_llc(src_mac)?;
    let mut tcn = [0u8; 4];
    BigEndian::write_u16(&mut tcn[0..2], 0);
    tcn[2] = 0;
    tcn[3] = 0x80;
    frame.set_payload(&tcn)?;
    frame.set_length();
    Ok(frame)
}
