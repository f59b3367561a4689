//! This node's own key pairs.
//!
//! Keys are generated lazily and published to the trust store so that
//! loopback delivery resolves our own key like any peer's.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use fleet_telemetry::log_key_event;
use parking_lot::RwLock;
use shared_crypto::NodeKeyPair;
use shared_types::{KeyId, Node};
use tokio::sync::Mutex;

use crate::domain::{all_expire_within, KeyConfig, LocalKey, NodeKey, NotifyError};
use crate::ports::{TimeSource, TrustStore};

/// Own key ring.
pub struct KeyRing {
    node: Node,
    trust: Arc<dyn TrustStore>,
    time: Arc<dyn TimeSource>,
    config: KeyConfig,
    keys: RwLock<Vec<LocalKey>>,
    /// Serializes generation so concurrent callers share one new key.
    generate: Mutex<()>,
}

impl KeyRing {
    pub fn new(
        node: Node,
        trust: Arc<dyn TrustStore>,
        time: Arc<dyn TimeSource>,
        config: KeyConfig,
    ) -> Self {
        Self {
            node,
            trust,
            time,
            config,
            keys: RwLock::new(Vec::new()),
            generate: Mutex::new(()),
        }
    }

    /// Identity of this node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Origin our own keys are bound to.
    pub fn local_origin(&self) -> IpAddr {
        self.node
            .primary_ip()
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    /// Adopt an existing key pair (e.g. loaded from disk) and publish it.
    pub async fn import(&self, key_id: KeyId, pair: NodeKeyPair) -> Result<LocalKey, NotifyError> {
        let record = NodeKey::new(
            key_id,
            self.node.id,
            pair.public(),
            self.local_origin(),
            self.time.now(),
            self.config.key_lifetime(),
        );
        let record = self.trust.create(record).await?;
        let key = LocalKey { record, pair };
        self.keys.write().push(key.clone());
        Ok(key)
    }

    /// Newest usable key, generating one when none is left outside the
    /// generation limit.
    pub async fn current(&self) -> Result<LocalKey, NotifyError> {
        if let Some(key) = self.usable() {
            return Ok(key);
        }

        let _guard = self.generate.lock().await;
        if let Some(key) = self.usable() {
            return Ok(key);
        }

        let key_id = KeyId::new_random();
        let key = self.import(key_id, NodeKeyPair::generate()).await?;
        log_key_event!(
            info,
            "Generated node key",
            self.node.id,
            key_id,
            key.record.bound_origin,
            expires_at = key.record.expires_at.as_millis()
        );
        Ok(key)
    }

    /// One of our keys that has not expired.
    pub fn find(&self, key_id: &KeyId) -> Option<LocalKey> {
        let now = self.time.now();
        self.keys
            .read()
            .iter()
            .find(|k| k.key_id() == *key_id && k.record.is_current(now))
            .cloned()
    }

    /// Public records of every key we hold.
    pub fn records(&self) -> Vec<NodeKey> {
        self.keys.read().iter().map(|k| k.record.clone()).collect()
    }

    /// Drop keys that have expired. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.time.now();
        let mut keys = self.keys.write();
        let before = keys.len();
        keys.retain(|k| k.record.is_current(now));
        before - keys.len()
    }

    fn usable(&self) -> Option<LocalKey> {
        let now = self.time.now();
        let keys = self.keys.read();
        let current: Vec<NodeKey> = keys
            .iter()
            .filter(|k| k.record.is_current(now))
            .map(|k| k.record.clone())
            .collect();
        if all_expire_within(&current, now, self.config.generation_limit) {
            return None;
        }
        keys.iter()
            .filter(|k| k.record.is_current(now))
            .max_by_key(|k| k.record.expires_at)
            .cloned()
    }
}
