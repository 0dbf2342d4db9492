//! Traffic source identity.

use serde::Serialize;
use std::net::{IpAddr, SocketAddr};

/// The address a piece of traffic is attributed to.
///
/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are folded onto their IPv4
/// form so a dual-stack listener counts one client once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SourceKey(IpAddr);

impl SourceKey {
    pub fn new(ip: IpAddr) -> Self {
        Self(ip.to_canonical())
    }

    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

impl From<IpAddr> for SourceKey {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl From<SocketAddr> for SourceKey {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip())
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn mapped_ipv6_equals_ipv4() {
        let v4 = SourceKey::from(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)));
        let mapped = SourceKey::from(IpAddr::V6(Ipv4Addr::new(192, 0, 2, 7).to_ipv6_mapped()));
        assert_eq!(v4, mapped);
        assert_eq!(mapped.to_string(), "192.0.2.7");
    }

    #[test]
    fn plain_ipv6_is_kept() {
        let ip = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));
        assert_eq!(SourceKey::from(ip).ip(), ip);
    }

    #[test]
    fn socket_port_is_ignored() {
        let a: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let b: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        assert_eq!(SourceKey::from(a), SourceKey::from(b));
    }
}
