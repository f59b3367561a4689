//! Network origin matching.
//!
//! A key is bound to the address it was first seen from. A request matches
//! when it arrives from that address, or when it arrives over loopback and
//! the bound address is one of this host's own addresses (same-host delivery
//! where the observed peer address is not the real origin).

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use shared_types::canonical_ip;

/// Result of comparing a bound origin with an observed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginMatch {
    Exact,
    LocalAlias,
    Mismatch,
}

impl OriginMatch {
    pub fn is_match(&self) -> bool {
        !matches!(self, OriginMatch::Mismatch)
    }
}

/// Addresses that belong to this process's host.
#[derive(Debug, Clone, Default)]
pub struct LocalAddresses {
    addrs: HashSet<IpAddr>,
}

impl LocalAddresses {
    /// Loopback addresses plus `configured`.
    pub fn new(configured: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut addrs: HashSet<IpAddr> = configured.into_iter().map(canonical_ip).collect();
        addrs.insert(IpAddr::V4(Ipv4Addr::LOCALHOST));
        addrs.insert(IpAddr::V6(Ipv6Addr::LOCALHOST));
        Self { addrs }
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.addrs.contains(&canonical_ip(*addr))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpAddr> {
        self.addrs.iter()
    }

    /// Compare the origin a key is bound to with the one a request came from.
    pub fn check(&self, bound: IpAddr, observed: IpAddr) -> OriginMatch {
        let bound = canonical_ip(bound);
        let observed = canonical_ip(observed);
        if bound == observed {
            OriginMatch::Exact
        } else if observed.is_loopback() && self.contains(&bound) {
            OriginMatch::LocalAlias
        } else {
            OriginMatch::Mismatch
        }
    }
}
