//! Trust records.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_crypto::{NodeKeyPair, PublicKeyBytes};
use shared_types::{KeyId, NodeId, Timestamp};

/// A public key trusted for a node, bound to the network origin it was first
/// seen from.
///
/// `bound_origin` never changes for the life of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeKey {
    pub key_id: KeyId,
    pub node_id: NodeId,
    pub public_key: PublicKeyBytes,
    pub bound_origin: IpAddr,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl NodeKey {
    /// Build a record that is valid from `now` for `lifetime`.
    pub fn new(
        key_id: KeyId,
        node_id: NodeId,
        public_key: PublicKeyBytes,
        bound_origin: IpAddr,
        now: Timestamp,
        lifetime: Duration,
    ) -> Self {
        Self {
            key_id,
            node_id,
            public_key,
            bound_origin: shared_types::canonical_ip(bound_origin),
            created_at: now,
            expires_at: now.plus(lifetime),
        }
    }

    /// Not yet expired.
    pub fn is_current(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }

    /// Expires before `now + window`.
    pub fn expires_within(&self, now: Timestamp, window: Duration) -> bool {
        self.expires_at <= now.plus(window)
    }
}

/// True when there is nothing to keep: no keys, or every key expires within
/// `window`.
pub fn all_expire_within(keys: &[NodeKey], now: Timestamp, window: Duration) -> bool {
    keys.iter().all(|k| k.expires_within(now, window))
}

/// One of this node's own keys, with its secret half.
#[derive(Debug, Clone)]
pub struct LocalKey {
    pub record: NodeKey,
    pub pair: NodeKeyPair,
}

impl LocalKey {
    pub fn key_id(&self) -> KeyId {
        self.record.key_id
    }
}
