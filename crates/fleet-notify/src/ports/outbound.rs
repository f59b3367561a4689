//! Outbound (Driven) ports.
//!
//! Persistence, transport and the external authorities the protocol
//! consults. Every implementation must be `Send + Sync`; services hold them
//! as `Arc<dyn ...>`.

use std::net::IpAddr;

use async_trait::async_trait;
use shared_crypto::Envelope;
use shared_types::{
    KeyId, NetworkId, NetworkState, NodeId, NotificationId, NotificationReceipt, Timestamp,
};

use crate::domain::{NodeKey, ReceivedNotification, Record, StoreError, TransportError};

/// Wire header names.
pub mod headers {
    pub const FROM_NODE_KEY: &str = "X-From-Node-Key";
    pub const FROM_NODE_UUID: &str = "X-From-Node-Uuid";
    pub const TO_NODE_KEY: &str = "X-To-Node-Key";
    pub const RESTORE_KEY: &str = "X-Restore-Key";
}

/// Trust records keyed by (node, key).
///
/// Holds no policy; every decision lives in `KeyDiscovery`.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Key `key_id` of `node_id`, if known.
    async fn find_key(&self, node_id: &NodeId, key_id: &KeyId) -> Result<Option<NodeKey>, StoreError>;

    /// All keys of `node_id` that have not expired at `now`.
    async fn find_current_keys(
        &self,
        node_id: &NodeId,
        now: Timestamp,
    ) -> Result<Vec<NodeKey>, StoreError>;

    /// Origin the node's first key was bound to, of any age.
    async fn find_bound_origin(&self, node_id: &NodeId) -> Result<Option<IpAddr>, StoreError>;

    /// Insert if absent.
    ///
    /// When a record for the same (node, key) already exists and is still
    /// current at `key.created_at`, the stored row is returned unchanged and
    /// `key` is discarded. An expired row is replaced.
    async fn create(&self, key: NodeKey) -> Result<NodeKey, StoreError>;
}

/// Plain CRUD over one record type.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn create(&self, item: T) -> Result<T, StoreError>;

    async fn find(&self, id: &T::Id) -> Result<Option<T>, StoreError>;

    /// Replace the stored row. Fails with `StoreError::NotFound` if absent.
    async fn update(&self, item: T) -> Result<T, StoreError>;
}

/// Received notifications, with the queries the inbox needs.
#[async_trait]
pub trait InboxRepository: Repository<ReceivedNotification> {
    /// Up to `limit` rows still marked `new`, oldest first.
    async fn find_new(&self, limit: usize) -> Result<Vec<ReceivedNotification>, StoreError>;

    /// Atomically move row `id` from `new` to `processing`.
    ///
    /// Returns `None` when the row is missing or not `new`, so that two
    /// processors never dispatch the same row.
    async fn claim(
        &self,
        id: &NotificationId,
        now: Timestamp,
    ) -> Result<Option<ReceivedNotification>, StoreError>;

    /// Every row received for a sender correlation id.
    async fn find_by_notification_id(
        &self,
        notification_id: &NotificationId,
    ) -> Result<Vec<ReceivedNotification>, StoreError>;
}

/// Identifying headers sent with an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryHeaders {
    pub from_node: NodeId,
    pub from_key: KeyId,
    pub to_key: KeyId,
    pub restore_key: Option<String>,
}

impl DeliveryHeaders {
    /// Header name/value pairs in wire form.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (headers::FROM_NODE_UUID, self.from_node.to_string()),
            (headers::FROM_NODE_KEY, self.from_key.to_string()),
            (headers::TO_NODE_KEY, self.to_key.to_string()),
        ];
        if let Some(restore) = &self.restore_key {
            pairs.push((headers::RESTORE_KEY, restore.clone()));
        }
        pairs
    }
}

/// Delivers an envelope to a remote node's notify endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        uri: &str,
        headers: &DeliveryHeaders,
        envelope: &Envelope,
    ) -> Result<NotificationReceipt, TransportError>;
}

/// Recognizes one-time restore tokens.
#[async_trait]
pub trait RestoreAuthority: Send + Sync {
    async fn is_valid_restore_token(&self, token: &str) -> Result<bool, StoreError>;
}

/// Network lifecycle lookups.
#[async_trait]
pub trait NetworkStateProvider: Send + Sync {
    async fn network_state(&self, network: &NetworkId) -> Result<Option<NetworkState>, StoreError>;
}

/// A registered large-payload read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTicket {
    pub token: String,
    /// Node allowed to fetch the payload.
    pub from_node: NodeId,
    pub created_at: Timestamp,
}

/// Byte streams fetched through `GET /notify/read/{token}`.
#[async_trait]
pub trait StorageStream: Send + Sync {
    /// Register `data` for one read by `from_node`. Returns the token.
    async fn register(&self, from_node: NodeId, data: Vec<u8>) -> Result<String, StoreError>;

    async fn find_read(&self, token: &str) -> Result<Option<StorageTicket>, StoreError>;

    /// Payload for a ticket; `None` if it vanished.
    async fn read(&self, ticket: &StorageTicket) -> Result<Option<Vec<u8>>, StoreError>;

    async fn clear_token(&self, token: &str) -> Result<(), StoreError>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;

    /// Deliberate offset from the real clock in milliseconds. While non-zero,
    /// replies are never shared between identical calls.
    fn offset_ms(&self) -> i64 {
        0
    }
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
