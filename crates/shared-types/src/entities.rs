//! # Core Domain Entities
//!
//! Identity types and the `Node` record. Nodes are owned by an external
//! registry; the notification core only reads them.
//!
//! ## Clusters
//!
//! - **Identifiers**: UUID newtypes, one per entity kind
//! - **Time**: `Timestamp`
//! - **Network**: `Node`, `NetworkState`

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::TypeError;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| TypeError::InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identity of a node in the fleet.
    NodeId,
    "node"
);
uuid_id!(
    /// Identity of a trust record (one node may hold several).
    KeyId,
    "key"
);
uuid_id!(
    /// Network a node belongs to.
    NetworkId,
    "network"
);
uuid_id!(
    /// Domain a network belongs to.
    DomainId,
    "domain"
);
uuid_id!(
    /// Account that owns a network.
    AccountId,
    "account"
);

/// Notification / correlation identifier.
///
/// Uses UUID v7 so ids sort by creation time in logs and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    /// Create a new time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NotificationId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| TypeError::InvalidId {
                kind: "notification",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// TIME
// =============================================================================

/// Wall-clock instant in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Current system time.
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Self(d.as_millis() as u64))
            .unwrap_or_default()
    }

    /// Milliseconds since the epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// This instant shifted forward by `d`.
    pub fn plus(&self, d: Duration) -> Self {
        Self(self.0.saturating_add(d.as_millis() as u64))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// =============================================================================
// NETWORK
// =============================================================================

/// A deployed node as known to the local registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub network: NetworkId,
    pub domain: DomainId,
    pub account: AccountId,
    /// Host name used to build API URIs.
    pub fqdn: String,
    pub ip4: Option<Ipv4Addr>,
    pub ip6: Option<Ipv6Addr>,
    /// Port of the node's notification API.
    pub admin_port: u16,
    #[serde(default)]
    pub tls: bool,
}

impl Node {
    /// Whether `addr` is one of this node's registered addresses.
    ///
    /// IPv4-mapped IPv6 addresses are compared as IPv4.
    pub fn has_same_ip(&self, addr: &IpAddr) -> bool {
        match canonical_ip(*addr) {
            IpAddr::V4(v4) => self.ip4 == Some(v4),
            IpAddr::V6(v6) => self.ip6 == Some(v6),
        }
    }

    /// Preferred address for this node, IPv4 first.
    pub fn primary_ip(&self) -> Option<IpAddr> {
        self.ip4
            .map(IpAddr::V4)
            .or_else(|| self.ip6.map(IpAddr::V6))
    }

    /// True when both nodes belong to the same network, domain and account.
    pub fn same_fleet(&self, other: &Node) -> bool {
        self.network == other.network && self.domain == other.domain && self.account == other.account
    }

    /// Base URI of this node's API.
    pub fn base_uri(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.fqdn, self.admin_port)
    }

    /// URI of the notification endpoint on this node.
    pub fn notify_uri(&self) -> String {
        format!("{}/notify", self.base_uri())
    }
}

/// Collapse IPv4-mapped IPv6 addresses so origin comparisons are stable.
pub fn canonical_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// Lifecycle state of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Created,
    Starting,
    Running,
    /// Network is being rebuilt from a backup.
    Restoring,
    Stopping,
    Stopped,
}

/// Current state of a network and when it entered that state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub network: NetworkId,
    pub status: NetworkStatus,
    pub since: Timestamp,
}

impl NetworkState {
    /// Whether the network is restoring and entered that state within `window`.
    pub fn is_restoring_within(&self, now: Timestamp, window: Duration) -> bool {
        self.status == NetworkStatus::Restoring && now.saturating_since(self.since) <= window
    }
}
