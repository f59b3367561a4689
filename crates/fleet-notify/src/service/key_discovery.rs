//! # Key Discovery
//!
//! Decides whether the sender key claimed by an inbound notification is
//! acceptable, and creates the trust record when a new key is admitted.
//!
//! ## Decision order
//!
//! 1. Known current key: accept if the request comes from the bound origin,
//!    or over loopback when the bound origin is one of our own addresses.
//!    An expired record is treated as unknown.
//! 2. Unknown key: the node's bound origin, if any, must match the request.
//! 3. A current key with the same public key material is reused.
//! 4. No current keys: first contact, bind the new key to the request origin.
//! 5. Every current key expires within the generation limit: rotation.
//! 6. A valid restore token while the network is restoring.
//! 7. Otherwise reject.
//!
//! Record creation for paths 4 to 6 is serialized by a striped lock keyed
//! by (node, key), so racing first contacts store exactly one record.

use std::net::IpAddr;
use std::sync::Arc;

use fleet_telemetry::log_key_event;
use fleet_telemetry::metrics::KEY_DECISIONS;
use shared_crypto::{blake3_hash_many, PublicKeyBytes};
use shared_types::{KeyId, Node, Timestamp};
use tokio::sync::Mutex;

use crate::domain::{
    all_expire_within, KeyConfig, LocalAddresses, NodeKey, NotifyError, OriginMatch, Rejection,
};
use crate::ports::{NetworkStateProvider, RestoreAuthority, TimeSource, TrustStore};

/// A sender key as presented by an inbound request.
#[derive(Debug, Clone)]
pub struct KeyClaim {
    /// Registered sender node.
    pub from_node: Node,
    pub key_id: KeyId,
    /// Network-level peer address.
    pub origin: IpAddr,
    pub restore_token: Option<String>,
    /// Public key carried by the envelope itself.
    pub public_key: PublicKeyBytes,
}

/// Which rule admitted a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptPath {
    KnownKey,
    LocalAlias,
    SameMaterial,
    Bootstrap,
    RotationGrace,
    Restore,
}

impl AcceptPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptPath::KnownKey => "known_key",
            AcceptPath::LocalAlias => "local_alias",
            AcceptPath::SameMaterial => "same_material",
            AcceptPath::Bootstrap => "bootstrap",
            AcceptPath::RotationGrace => "rotation_grace",
            AcceptPath::Restore => "restore",
        }
    }

    /// Paths that create a new trust record.
    pub fn creates_record(&self) -> bool {
        matches!(
            self,
            AcceptPath::Bootstrap | AcceptPath::RotationGrace | AcceptPath::Restore
        )
    }
}

/// An admitted sender key.
#[derive(Debug, Clone)]
pub struct AcceptedKey {
    pub key: NodeKey,
    pub path: AcceptPath,
}

/// The acceptance state machine.
pub struct KeyDiscovery {
    trust: Arc<dyn TrustStore>,
    restore: Arc<dyn RestoreAuthority>,
    networks: Arc<dyn NetworkStateProvider>,
    time: Arc<dyn TimeSource>,
    local: LocalAddresses,
    config: KeyConfig,
    stripes: Vec<Mutex<()>>,
}

impl KeyDiscovery {
    pub fn new(
        trust: Arc<dyn TrustStore>,
        restore: Arc<dyn RestoreAuthority>,
        networks: Arc<dyn NetworkStateProvider>,
        time: Arc<dyn TimeSource>,
        local: LocalAddresses,
        config: KeyConfig,
    ) -> Self {
        let stripes = (0..config.lock_stripes.max(1))
            .map(|_| Mutex::new(()))
            .collect();
        Self {
            trust,
            restore,
            networks,
            time,
            local,
            config,
            stripes,
        }
    }

    pub fn local_addresses(&self) -> &LocalAddresses {
        &self.local
    }

    /// Accept or reject a claimed sender key.
    ///
    /// Rejections come back as `NotifyError::Forbidden`.
    pub async fn discover(&self, claim: &KeyClaim) -> Result<AcceptedKey, NotifyError> {
        let result = self.decide(claim).await;
        match &result {
            Ok(accepted) => {
                KEY_DECISIONS.with_label_values(&[accepted.path.as_str()]).inc();
                if accepted.path.creates_record() {
                    log_key_event!(
                        info,
                        "Accepted new node key",
                        claim.from_node.id,
                        claim.key_id,
                        claim.origin,
                        path = accepted.path.as_str()
                    );
                }
            }
            Err(NotifyError::Forbidden(rejection)) => {
                KEY_DECISIONS.with_label_values(&["rejected"]).inc();
                log_key_event!(
                    warn,
                    "Rejected node key",
                    claim.from_node.id,
                    claim.key_id,
                    claim.origin,
                    reason = rejection.reason()
                );
            }
            Err(_) => {}
        }
        result
    }

    async fn decide(&self, claim: &KeyClaim) -> Result<AcceptedKey, NotifyError> {
        let node_id = claim.from_node.id;
        let now = self.time.now();

        if let Some(key) = self.find_current_key(claim, now).await? {
            return self.accept_known(key, claim.origin);
        }

        if let Some(bound) = self.trust.find_bound_origin(&node_id).await? {
            if !self.local.check(bound, claim.origin).is_match() {
                return Err(Rejection::NodeOriginChanged {
                    node_id,
                    bound,
                    observed: claim.origin,
                }
                .into());
            }
        }

        let current = self.trust.find_current_keys(&node_id, now).await?;

        if let Some(existing) = current.iter().find(|k| k.public_key == claim.public_key) {
            return Ok(AcceptedKey {
                key: existing.clone(),
                path: AcceptPath::SameMaterial,
            });
        }

        let path = if current.is_empty() {
            AcceptPath::Bootstrap
        } else if all_expire_within(&current, now, self.config.generation_limit) {
            AcceptPath::RotationGrace
        } else if self.restore_allowed(claim, now).await? {
            AcceptPath::Restore
        } else {
            return Err(Rejection::KeyNotTrusted {
                node_id,
                key_id: claim.key_id,
            }
            .into());
        };

        self.create_key(claim, path, now).await
    }

    async fn find_current_key(
        &self,
        claim: &KeyClaim,
        now: Timestamp,
    ) -> Result<Option<NodeKey>, NotifyError> {
        Ok(self
            .trust
            .find_key(&claim.from_node.id, &claim.key_id)
            .await?
            .filter(|key| key.is_current(now)))
    }

    fn accept_known(&self, key: NodeKey, origin: IpAddr) -> Result<AcceptedKey, NotifyError> {
        let path = match self.local.check(key.bound_origin, origin) {
            OriginMatch::Exact => AcceptPath::KnownKey,
            OriginMatch::LocalAlias => AcceptPath::LocalAlias,
            OriginMatch::Mismatch => {
                return Err(Rejection::OriginMismatch {
                    node_id: key.node_id,
                    key_id: key.key_id,
                    bound: key.bound_origin,
                    observed: origin,
                }
                .into())
            }
        };
        Ok(AcceptedKey { key, path })
    }

    async fn restore_allowed(&self, claim: &KeyClaim, now: Timestamp) -> Result<bool, NotifyError> {
        let Some(token) = claim.restore_token.as_deref() else {
            return Ok(false);
        };
        let restoring = self
            .networks
            .network_state(&claim.from_node.network)
            .await?
            .is_some_and(|state| state.is_restoring_within(now, self.config.restore_window));
        if !restoring {
            return Ok(false);
        }
        if !self.restore.is_valid_restore_token(token).await? {
            return Ok(false);
        }
        Ok(claim.from_node.has_same_ip(&claim.origin))
    }

    async fn create_key(
        &self,
        claim: &KeyClaim,
        path: AcceptPath,
        now: Timestamp,
    ) -> Result<AcceptedKey, NotifyError> {
        let node_id = claim.from_node.id;
        let _guard = self.stripe(claim).lock().await;

        // Another request for the same (node, key) may have won the race.
        if let Some(existing) = self.find_current_key(claim, now).await? {
            return self.accept_known(existing, claim.origin);
        }

        let record = NodeKey::new(
            claim.key_id,
            node_id,
            claim.public_key,
            claim.origin,
            now,
            self.config.key_lifetime(),
        );
        let stored = self.trust.create(record).await?;
        Ok(AcceptedKey { key: stored, path })
    }

    fn stripe(&self, claim: &KeyClaim) -> &Mutex<()> {
        let digest = blake3_hash_many(&[
            claim.from_node.id.as_uuid().as_bytes(),
            claim.key_id.as_uuid().as_bytes(),
        ]);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(head) % self.stripes.len() as u64) as usize;
        &self.stripes[index]
    }
}
