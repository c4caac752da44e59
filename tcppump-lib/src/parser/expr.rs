use crate::address::MacAddress;
use crate::error::{PumpError, Result};
use crate::frame::ethernet::EthernetFrame;
use crate::frame::{arp::ArpFrame, ipv4, stp};
use crate::parser::paramlist::ParameterList;

/// One `proto(k=v, ...)` clause of an inline packet expression, e.g. the
/// `eth(...)` in `eth(...):ipv4(...)`.
#[derive(Debug, Clone)]
pub struct ProtocolClause {
    pub protocol: String,
    pub params: ParameterList,
}

/// Splits `proto(params):proto(params):...` into its clauses. Colons inside
/// a `(...)` are not separators.
pub fn split_clauses(expr: &str) -> Result<Vec<ProtocolClause>> {
    let mut clauses = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let name_start = i;
        while i < chars.len() && chars[i] != '(' {
            i += 1;
        }
        if i >= chars.len() {
            return Err(PumpError::parse("expected '(' after protocol name", crate::error::Span::default()));
        }
        let protocol: String = chars[name_start..i].iter().collect::<String>().trim().to_string();

        let paren_start = i;
        let mut depth = 0i32;
        while i < chars.len() {
            match chars[i] {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        i += 1;
                        break;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        if depth != 0 {
            return Err(PumpError::parse("unbalanced parentheses in packet expression", crate::error::Span::default()));
        }
        let param_str: String = chars[paren_start..i].iter().collect();
        let params = ParameterList::parse(&param_str)?;
        clauses.push(ProtocolClause { protocol, params });

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i < chars.len() && chars[i] == ':' {
            i += 1;
        } else if i < chars.len() {
            return Err(PumpError::parse("expected ':' between protocol clauses", crate::error::Span::default()));
        }
    }

    if clauses.is_empty() {
        return Err(PumpError::parse("empty packet expression", crate::error::Span::default()));
    }
    Ok(clauses)
}

/// The product of compiling one inline/script packet expression: either a
/// single frame or an unfragmented IPv4 packet plus the data needed to
/// fragment it later (MTU is only known once the resolver/config is final).
pub enum CompiledPacket {
    Frame(EthernetFrame),
    Ipv4 { src_mac: MacAddress, dst_mac: Option<MacAddress>, params: ipv4::Ipv4Params, payload: Vec<u8> },
}

/// Compiles a single `:`-joined protocol chain into a packet. Supports the
/// protocols named in the wire grammar: `eth`, `arp`, `ipv4`, `stp-config`,
/// `stp-rstp`, `stp-tcn`.
pub fn compile_expression(expr: &str, default_src_mac: MacAddress) -> Result<CompiledPacket> {
    let clauses = split_clauses(expr)?;
    let head = &clauses[0];

    match head.protocol.as_str() {
        "eth" => compile_eth(head, &clauses[1..]),
        "arp" => compile_arp(head, default_src_mac),
        "ipv4" => compile_ipv4(head, default_src_mac, &clauses[1..]),
        "stp-config" => compile_stp_config(head, default_src_mac),
        "stp-rstp" => compile_stp_rstp(head, default_src_mac),
        "stp-tcn" => Ok(CompiledPacket::Frame(stp::tcn_bpdu(default_src_mac)?)),
        other => Err(PumpError::ParamUnknown { name: other.into() }),
    }
}

fn compile_eth(clause: &ProtocolClause, inner: &[ProtocolClause]) -> Result<CompiledPacket> {
    let p = &clause.params;
    let src = p.find("src")?.as_mac()?;
    let dst = p.find("dst")?.as_mac()?;
    let etype = p.find("etype")?.as_u16(0, u16::MAX)?;

    let mut frame = EthernetFrame::with_default_capacity();
    frame.set_mac_header(src, dst);

    // Up to two tags may be stacked (outer then inner), each a repeated
    // `vid=` occurrence with its own `prio=`/`vtype=` scoped to the span
    // between it and the next `vid=` (or the end of the list), the same
    // duplicate-aware convention `find_after` follows throughout.
    let mut prev_vid: Option<&crate::parser::paramlist::Parameter> = None;
    for _ in 0..2 {
        let vid = match p.find_after(prev_vid, None, "vid") {
            Ok(vid) => vid,
            Err(_) => break,
        };
        let scope_start = vid.index + 1;
        let prio = p
            .iter()
            .skip(scope_start)
            .take_while(|param| param.name != "vid")
            .find(|param| param.name == "prio")
            .map(|param| param.as_u16(0, 7))
            .transpose()?
            .unwrap_or(0);
        let is_c_tag = p
            .iter()
            .skip(scope_start)
            .take_while(|param| param.name != "vid")
            .find(|param| param.name == "vtype")
            .map(|param| param.as_str() != "s")
            .unwrap_or(true);
        frame.add_vlan_tag(is_c_tag, vid.as_u16(0, 0x0fff)?, prio, 0)?;
        prev_vid = Some(vid);
    }

    frame.set_type_length(etype);

    if let Some(payload) = p.find_optional("payload") {
        frame.set_payload(&payload.as_stream()?)?;
    }
    let _ = inner;
    Ok(CompiledPacket::Frame(frame))
}

fn compile_arp(clause: &ProtocolClause, default_src_mac: MacAddress) -> Result<CompiledPacket> {
    let p = &clause.params;
    let op = p.find_optional("op").map(|v| v.as_u8(1, 2)).transpose()?.unwrap_or(1);
    let src_mac = p.find_optional("srcmac").map(|v| v.as_mac()).transpose()?.unwrap_or(default_src_mac);
    let src_ip = p.find("srcip")?.as_ipv4()?;
    let dst_ip = p.find("dstip")?.as_ipv4()?;

    let frame = if op == 1 {
        ArpFrame::who_has(src_mac, src_ip, dst_ip)?
    } else {
        let dst_mac = p.find("dstmac")?.as_mac()?;
        ArpFrame::reply(src_mac, src_ip, dst_mac, dst_ip)?
    };
    Ok(CompiledPacket::Frame(frame))
}

fn compile_ipv4(clause: &ProtocolClause, default_src_mac: MacAddress, inner: &[ProtocolClause]) -> Result<CompiledPacket> {
    let p = &clause.params;
    let src = p.find("src")?.as_ipv4()?;
    let dst = p.find("dst")?.as_ipv4()?;
    let proto = p.find_optional("proto").map(|v| v.as_u8(0, 255)).transpose()?.unwrap_or(0);
    let ttl = p.find_optional("ttl").map(|v| v.as_u8(0, 255)).transpose()?.unwrap_or(64);
    let tos = p.find_optional("tos").map(|v| v.as_u8(0, 255)).transpose()?.unwrap_or(0);
    let df = p.find_optional("df").map(|v| v.as_bool()).transpose()?.unwrap_or(false);
    let dst_mac = p.find_optional("dstmac").map(|v| v.as_mac()).transpose()?;

    let payload = if let Some(payload) = p.find_optional("payload") {
        payload.as_stream()?
    } else if let Some(first_inner) = inner.first() {
        match compile_expression_from_clause(first_inner, default_src_mac)? {
            CompiledPacket::Frame(f) => f.payload().to_vec(),
            CompiledPacket::Ipv4 { payload, .. } => payload,
        }
    } else {
        Vec::new()
    };

    let params = ipv4::Ipv4Params { src, dst, protocol: proto, ttl, tos, dont_fragment: df, identification: 0 };
    Ok(CompiledPacket::Ipv4 { src_mac: default_src_mac, dst_mac, params, payload })
}

fn compile_expression_from_clause(clause: &ProtocolClause, default_src_mac: MacAddress) -> Result<CompiledPacket> {
    match clause.protocol.as_str() {
        "eth" => compile_eth(clause, &[]),
        "arp" => compile_arp(clause, default_src_mac),
        other => Err(PumpError::ParamUnknown { name: other.into() }),
    }
}

fn compile_stp_config(clause: &ProtocolClause, default_src_mac: MacAddress) -> Result<CompiledPacket> {
    let p = &clause.params;
    let src_mac = p.find_optional("srcmac").map(|v| v.as_mac()).transpose()?.unwrap_or(default_src_mac);
    let root = stp::BridgeId {
        priority: p.find("rootprio")?.as_u8(0, 15)?,
        system_id_ext: p.find("rootid")?.as_u16(0, 0x0fff)?,
        mac: p.find("rootmac")?.as_mac()?,
    };
    let bridge = stp::BridgeId {
        priority: p.find("brprio")?.as_u8(0, 15)?,
        system_id_ext: p.find("brid")?.as_u16(0, 0x0fff)?,
        mac: p.find("brmac")?.as_mac()?,
    };
    let path_cost = p.find("pathcost")?.as_u32(0, u32::MAX)?;
    let port_prio = p.find_optional("portprio").map(|v| v.as_u8(0, 15)).transpose()?.unwrap_or(8);
    let port_number = p.find("port")?.as_u16(1, 0x0fff)?;

    let frame = stp::config_bpdu(src_mac, &root, path_cost, &bridge, port_prio, port_number, 0.0, 20.0, 2.0, 15.0, stp::StpFlags::default())?;
    Ok(CompiledPacket::Frame(frame))
}

fn compile_stp_rstp(clause: &ProtocolClause, default_src_mac: MacAddress) -> Result<CompiledPacket> {
    let p = &clause.params;
    let src_mac = p.find_optional("srcmac").map(|v| v.as_mac()).transpose()?.unwrap_or(default_src_mac);
    let root = stp::BridgeId {
        priority: p.find("rootprio")?.as_u8(0, 15)?,
        system_id_ext: p.find("rootid")?.as_u16(0, 0x0fff)?,
        mac: p.find("rootmac")?.as_mac()?,
    };
    let bridge = stp::BridgeId {
        priority: p.find("brprio")?.as_u8(0, 15)?,
        system_id_ext: p.find("brid")?.as_u16(0, 0x0fff)?,
        mac: p.find("brmac")?.as_mac()?,
    };
    let path_cost = p.find("pathcost")?.as_u32(0, u32::MAX)?;
    let port_prio = p.find_optional("portprio").map(|v| v.as_u8(0, 15)).transpose()?.unwrap_or(8);
    let port_number = p.find("port")?.as_u16(1, 0x0fff)?;
    let role = p.find_optional("role").map(|v| v.as_u8(0, 3)).transpose()?.unwrap_or(3);

    let frame = stp::rstp_config_bpdu(
        src_mac,
        &root,
        path_cost,
        &bridge,
        port_prio,
        port_number,
        0.0,
        20.0,
        2.0,
        15.0,
        stp::StpFlags { port_role: role, forwarding: true, ..Default::default() },
    )?;
    Ok(CompiledPacket::Frame(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    #[test]
    fn splits_chained_clauses() {
        let clauses = split_clauses("eth(src=12:34:56:78:9a:bc, dst=11:22:33:44:55:66, etype=0x0800):ipv4(src=1.2.3.4, dst=1.2.3.5)").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].protocol, "eth");
        assert_eq!(clauses[1].protocol, "ipv4");
    }

    #[test]
    fn compiles_plain_eth_frame() {
        let compiled = compile_expression("eth(src=12:34:56:78:9a:bc, dst=11:22:33:44:55:66, etype=0x1234, payload=aabbcc)", mac("00:00:00:00:00:01")).unwrap();
        match compiled {
            CompiledPacket::Frame(f) => {
                assert_eq!(f.type_length(), 0x1234);
                assert_eq!(f.payload(), &[0xaa, 0xbb, 0xcc]);
            }
            _ => panic!("expected a frame"),
        }
    }

    #[test]
    fn compiles_arp_who_has() {
        let compiled = compile_expression("arp(op=1, srcip=10.0.0.1, dstip=10.0.0.2)", mac("00:00:00:00:00:01")).unwrap();
        match compiled {
            CompiledPacket::Frame(f) => assert!(ArpFrame::is_request(&f)),
            _ => panic!("expected a frame"),
        }
    }

    #[test]
    fn compiles_eth_with_two_stacked_vlan_tags() {
        let compiled = compile_expression(
            "eth(src=12:34:56:78:9a:bc, dst=11:22:33:44:55:66, etype=0x0800, vid=12, prio=7, vtype=s, vid=34, vtype=c, payload=cafe)",
            mac("00:00:00:00:00:01"),
        )
        .unwrap();
        match compiled {
            CompiledPacket::Frame(f) => {
                assert_eq!(f.vlan_tag_count(), 2);
                assert_eq!(&f.get()[12..20], &[0x88, 0xa8, 0xe0, 0x0c, 0x81, 0x00, 0x00, 0x22]);
                assert_eq!(&f.get()[20..22], &[0x08, 0x00]);
                assert_eq!(f.payload(), &[0xca, 0xfe]);
            }
            _ => panic!("expected a frame"),
        }
    }

    #[test]
    fn compiles_ipv4_with_explicit_payload() {
        let compiled = compile_expression("ipv4(src=10.0.0.1, dst=10.0.0.2, proto=17, payload=aabb)", mac("00:00:00:00:00:01")).unwrap();
        match compiled {
            CompiledPacket::Ipv4 { payload, params, .. } => {
                assert_eq!(payload, vec![0xaa, 0xbb]);
                assert_eq!(params.protocol, 17);
            }
            _ => panic!("expected an ipv4 packet"),
        }
    }
}
