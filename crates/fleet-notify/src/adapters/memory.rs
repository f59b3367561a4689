//! In-memory adapters for the outbound ports.
//!
//! Used by the runtime until a durable backend is wired in, and by tests.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use shared_types::{KeyId, NetworkId, NetworkState, NodeId, NotificationId, Timestamp};
use uuid::Uuid;

use crate::domain::{NodeKey, ProcessingStatus, ReceivedNotification, Record, StoreError};
use crate::ports::{
    InboxRepository, NetworkStateProvider, Repository, RestoreAuthority, StorageStream,
    StorageTicket, TimeSource, TrustStore,
};

// =============================================================================
// TRUST STORE
// =============================================================================

/// Trust records in a concurrent map keyed by (node, key).
#[derive(Debug, Default)]
pub struct InMemoryTrustStore {
    keys: DashMap<(NodeId, KeyId), NodeKey>,
}

impl InMemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys across all nodes.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys of a node, any age.
    pub fn keys_for(&self, node_id: &NodeId) -> Vec<NodeKey> {
        self.keys
            .iter()
            .filter(|e| e.key().0 == *node_id)
            .map(|e| e.value().clone())
            .collect()
    }
}

#[async_trait]
impl TrustStore for InMemoryTrustStore {
    async fn find_key(&self, node_id: &NodeId, key_id: &KeyId) -> Result<Option<NodeKey>, StoreError> {
        Ok(self.keys.get(&(*node_id, *key_id)).map(|k| k.clone()))
    }

    async fn find_current_keys(
        &self,
        node_id: &NodeId,
        now: Timestamp,
    ) -> Result<Vec<NodeKey>, StoreError> {
        let mut keys: Vec<NodeKey> = self
            .keys
            .iter()
            .filter(|e| e.key().0 == *node_id && e.value().is_current(now))
            .map(|e| e.value().clone())
            .collect();
        keys.sort_by_key(|k| k.expires_at);
        Ok(keys)
    }

    async fn find_bound_origin(&self, node_id: &NodeId) -> Result<Option<IpAddr>, StoreError> {
        Ok(self
            .keys
            .iter()
            .filter(|e| e.key().0 == *node_id)
            .min_by_key(|e| e.value().created_at)
            .map(|e| e.value().bound_origin))
    }

    async fn create(&self, key: NodeKey) -> Result<NodeKey, StoreError> {
        match self.keys.entry((key.node_id, key.key_id)) {
            Entry::Occupied(mut existing) => {
                if !existing.get().is_current(key.created_at) {
                    existing.insert(key);
                }
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => Ok(slot.insert(key).clone()),
        }
    }
}

// =============================================================================
// REPOSITORIES
// =============================================================================

/// Generic record table.
pub struct InMemoryRepository<T: Record> {
    rows: DashMap<T::Id, T>,
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Snapshot of every row.
    pub fn all(&self) -> Vec<T> {
        self.rows.iter().map(|e| e.value().clone()).collect()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    async fn create(&self, item: T) -> Result<T, StoreError> {
        match self.rows.entry(item.record_id()) {
            Entry::Occupied(_) => Err(StoreError::Backend(format!(
                "{} {} already exists",
                T::ENTITY,
                item.record_id()
            ))),
            Entry::Vacant(slot) => Ok(slot.insert(item).clone()),
        }
    }

    async fn find(&self, id: &T::Id) -> Result<Option<T>, StoreError> {
        Ok(self.rows.get(id).map(|r| r.clone()))
    }

    async fn update(&self, item: T) -> Result<T, StoreError> {
        match self.rows.get_mut(&item.record_id()) {
            Some(mut row) => {
                *row = item.clone();
                Ok(item)
            }
            None => Err(StoreError::NotFound {
                entity: T::ENTITY,
                id: item.record_id().to_string(),
            }),
        }
    }
}

#[async_trait]
impl InboxRepository for InMemoryRepository<ReceivedNotification> {
    async fn find_new(&self, limit: usize) -> Result<Vec<ReceivedNotification>, StoreError> {
        let mut rows: Vec<ReceivedNotification> = self
            .rows
            .iter()
            .filter(|e| e.value().processing_status == ProcessingStatus::New)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|r| r.received_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn claim(
        &self,
        id: &NotificationId,
        now: Timestamp,
    ) -> Result<Option<ReceivedNotification>, StoreError> {
        // The shard write lock makes check-and-set atomic per row.
        let Some(mut row) = self.rows.get_mut(id) else {
            return Ok(None);
        };
        if row.processing_status != ProcessingStatus::New {
            return Ok(None);
        }
        if row.advance(ProcessingStatus::Processing, now).is_err() {
            return Ok(None);
        }
        Ok(Some(row.clone()))
    }

    async fn find_by_notification_id(
        &self,
        notification_id: &NotificationId,
    ) -> Result<Vec<ReceivedNotification>, StoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|e| e.value().notification_id == *notification_id)
            .map(|e| e.value().clone())
            .collect())
    }
}

// =============================================================================
// AUTHORITIES
// =============================================================================

/// Restore tokens issued out of band.
#[derive(Debug, Default)]
pub struct StaticRestoreAuthority {
    tokens: RwLock<HashSet<String>>,
}

impl StaticRestoreAuthority {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: RwLock::new(tokens.into_iter().collect()),
        }
    }

    pub fn add_token(&self, token: impl Into<String>) {
        self.tokens.write().insert(token.into());
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.write().remove(token)
    }
}

#[async_trait]
impl RestoreAuthority for StaticRestoreAuthority {
    async fn is_valid_restore_token(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.tokens.read().contains(token))
    }
}

/// Network states set by the operator or a lifecycle driver.
#[derive(Debug, Default)]
pub struct InMemoryNetworkStates {
    states: DashMap<NetworkId, NetworkState>,
}

impl InMemoryNetworkStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, state: NetworkState) {
        self.states.insert(state.network, state);
    }
}

#[async_trait]
impl NetworkStateProvider for InMemoryNetworkStates {
    async fn network_state(&self, network: &NetworkId) -> Result<Option<NetworkState>, StoreError> {
        Ok(self.states.get(network).map(|s| s.clone()))
    }
}

// =============================================================================
// STORAGE STREAMS
// =============================================================================

/// Registered payloads held in memory until read.
pub struct InMemoryStorageStream {
    entries: DashMap<String, (StorageTicket, Arc<Vec<u8>>)>,
    time: Arc<dyn TimeSource>,
}

impl InMemoryStorageStream {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: DashMap::new(),
            time,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StorageStream for InMemoryStorageStream {
    async fn register(&self, from_node: NodeId, data: Vec<u8>) -> Result<String, StoreError> {
        let token = Uuid::new_v4().simple().to_string();
        let ticket = StorageTicket {
            token: token.clone(),
            from_node,
            created_at: self.time.now(),
        };
        self.entries.insert(token.clone(), (ticket, Arc::new(data)));
        Ok(token)
    }

    async fn find_read(&self, token: &str) -> Result<Option<StorageTicket>, StoreError> {
        Ok(self.entries.get(token).map(|e| e.0.clone()))
    }

    async fn read(&self, ticket: &StorageTicket) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .get(&ticket.token)
            .map(|e| e.1.as_ref().clone()))
    }

    async fn clear_token(&self, token: &str) -> Result<(), StoreError> {
        self.entries.remove(token);
        Ok(())
    }
}
