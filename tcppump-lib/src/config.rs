use crate::address::{IpAddress, Ip6Address, MacAddress};

/// Global, process-wide settings: our own identity and link MTU.
///
/// Two lifecycle phases, enforced by the type system rather than a runtime
/// flag: a [`GlobalConfigBuilder`] is writable during CLI-flag processing,
/// and `.freeze()` turns it into an immutable [`GlobalConfig`] the Compiler
/// and everything downstream only ever reads.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    own_mac: MacAddress,
    own_ipv4: Option<IpAddress>,
    own_ipv6: Option<Ip6Address>,
    mtu: usize,
}

impl GlobalConfig {
    pub fn own_mac(&self) -> MacAddress {
        self.own_mac
    }

    pub fn own_ipv4(&self) -> Option<IpAddress> {
        self.own_ipv4
    }

    pub fn own_ipv6(&self) -> Option<Ip6Address> {
        self.own_ipv6
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalConfigBuilder {
    own_mac: Option<MacAddress>,
    own_ipv4: Option<IpAddress>,
    own_ipv6: Option<Ip6Address>,
    mtu: Option<usize>,
}

impl GlobalConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn own_mac(mut self, mac: MacAddress) -> Self {
        self.own_mac = Some(mac);
        self
    }

    pub fn own_ipv4(mut self, ip: IpAddress) -> Self {
        self.own_ipv4 = Some(ip);
        self
    }

    pub fn own_ipv6(mut self, ip: Ip6Address) -> Self {
        self.own_ipv6 = Some(ip);
        self
    }

    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Freezes the configuration, defaulting an unset MTU to the standard
    /// Ethernet value (1500).
    pub fn freeze(self) -> GlobalConfig {
        GlobalConfig {
            own_mac: self.own_mac.unwrap_or_else(MacAddress::zero),
            own_ipv4: self.own_ipv4,
            own_ipv6: self.own_ipv6,
            mtu: self.mtu.unwrap_or(1500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeze_defaults_mtu_to_1500() {
        let cfg = GlobalConfigBuilder::new().own_mac(MacAddress::zero()).freeze();
        assert_eq!(cfg.mtu(), 1500);
    }
}
