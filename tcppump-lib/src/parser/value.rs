use crate::address::{IpAddress, Ip6Address, MacAddress};
use crate::error::{PumpError, Result};
use std::str::FromStr;

/// Parses an integer the way `strtoul(s, &end, 0)` does: a `0x`/`0X` prefix
/// selects base 16, a bare leading `0` (with more digits following) selects
/// base 8, anything else is decimal. The whole string must be consumed, and
/// the result must fit in `[range_begin, range_end]`.
pub fn parse_int_ranged(name: &str, raw: &str, range_begin: u64, range_end: u64) -> Result<u64> {
    let trimmed = raw.trim();
    let (body, radix) = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        (hex, 16)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        (&trimmed[1..], 8)
    } else {
        (trimmed, 10)
    };

    if body.is_empty() {
        return Err(PumpError::ParamFormat { name: name.into(), found: raw.into() });
    }

    let value = u64::from_str_radix(body, radix).map_err(|_| PumpError::ParamFormat { name: name.into(), found: raw.into() })?;

    if value < range_begin || value > range_end {
        return Err(PumpError::ParamRange { name: name.into(), found: raw.into() });
    }
    Ok(value)
}

pub fn parse_u8(name: &str, raw: &str, range_begin: u8, range_end: u8) -> Result<u8> {
    Ok(parse_int_ranged(name, raw, range_begin as u64, range_end as u64)? as u8)
}

pub fn parse_u16(name: &str, raw: &str, range_begin: u16, range_end: u16) -> Result<u16> {
    Ok(parse_int_ranged(name, raw, range_begin as u64, range_end as u64)? as u16)
}

pub fn parse_u32(name: &str, raw: &str, range_begin: u32, range_end: u32) -> Result<u32> {
    Ok(parse_int_ranged(name, raw, range_begin as u64, range_end as u64)? as u32)
}

pub fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PumpError::ParamFormat { name: name.into(), found: raw.into() }),
    }
}

pub fn parse_mac(name: &str, raw: &str) -> Result<MacAddress> {
    MacAddress::from_str(raw).map_err(|_| PumpError::ParamFormat { name: name.into(), found: raw.into() })
}

pub fn parse_ipv4(name: &str, raw: &str) -> Result<IpAddress> {
    IpAddress::from_str(raw).map_err(|_| PumpError::ParamFormat { name: name.into(), found: raw.into() })
}

pub fn parse_ipv6(name: &str, raw: &str) -> Result<Ip6Address> {
    Ip6Address::from_str(raw).map_err(|_| PumpError::ParamFormat { name: name.into(), found: raw.into() })
}

/// Decodes an even-length hex-digit string (`"0a1b2c"`) into raw bytes.
pub fn parse_hex_stream(name: &str, raw: &str) -> Result<Vec<u8>> {
    if raw.len() % 2 != 0 || raw.is_empty() {
        return Err(PumpError::ParamFormat { name: name.into(), found: raw.into() });
    }
    let mut out = Vec::with_capacity(raw.len() / 2);
    let bytes = raw.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16).ok_or_else(|| PumpError::ParamFormat { name: name.into(), found: raw.into() })?;
        let lo = (chunk[1] as char).to_digit(16).ok_or_else(|| PumpError::ParamFormat { name: name.into(), found: raw.into() })?;
        out.push(((hi << 4) | lo) as u8);
    }
    Ok(out)
}
