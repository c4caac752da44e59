use crate::error::{PumpError, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// A 6-octet Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0; 6])
    }

    pub fn bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// A random MAC address, forced unicast and/or locally-administered as requested.
    pub fn random(rng: &mut dyn super::rng::Rng, unicast: bool, locally_administered: bool) -> Self {
        let mut bytes = rng.random_bytes6();
        if unicast {
            bytes[0] &= !0x01;
        }
        if locally_administered {
            bytes[0] |= 0x02;
        }
        Self(bytes)
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl FromStr for MacAddress {
    type Err = PumpError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(PumpError::ParamFormat { name: "mac".into(), found: s.into() });
        }
        let mut bytes = [0u8; 6];
        for (i, p) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(p, 16)
                .map_err(|_| PumpError::ParamFormat { name: "mac".into(), found: s.into() })?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// An IPv4 address, kept distinct from `std::net::Ipv4Addr` at the API
/// boundary so parameter parsing can attach the spec's error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpAddress(Ipv4Addr);

impl IpAddress {
    pub const fn new(addr: Ipv4Addr) -> Self {
        Self(addr)
    }

    pub fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    pub fn inner(&self) -> Ipv4Addr {
        self.0
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr)
    }
}

impl FromStr for IpAddress {
    type Err = PumpError;

    fn from_str(s: &str) -> Result<Self> {
        Ipv4Addr::from_str(s)
            .map(IpAddress)
            .map_err(|_| PumpError::ParamFormat { name: "ipv4".into(), found: s.into() })
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An IPv6 address, parsed only (tcppump never builds an IPv6 frame itself;
/// `--myip6` merely records our own identity for completeness in §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ip6Address(Ipv6Addr);

impl Ip6Address {
    pub fn inner(&self) -> Ipv6Addr {
        self.0
    }
}

impl From<Ipv6Addr> for Ip6Address {
    fn from(addr: Ipv6Addr) -> Self {
        Self(addr)
    }
}

impl FromStr for Ip6Address {
    type Err = PumpError;

    fn from_str(s: &str) -> Result<Self> {
        Ipv6Addr::from_str(s)
            .map(Ip6Address)
            .map_err(|_| PumpError::ParamFormat { name: "ipv6".into(), found: s.into() })
    }
}

impl fmt::Display for Ip6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
