//! In-memory state of a synchronous call.

use std::sync::{Arc, OnceLock};

use serde::Serialize;
use shared_types::NotificationId;

use super::errors::NotifyError;

/// A request that can be issued synchronously.
///
/// Two requests with the same `cache_key` to the same target and type are
/// considered identical and may share one in-flight call.
pub trait SyncRequest: Serialize + Send + Sync {
    fn cache_key(&self) -> String;
}

impl SyncRequest for serde_json::Value {
    /// Canonical JSON: object keys are sorted by `serde_json::Map`.
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

/// How a slot was resolved.
#[derive(Debug, Clone)]
pub enum SlotOutcome {
    Response(serde_json::Value),
    Exception(String),
    SendFailed(Arc<NotifyError>),
}

/// Shared state of one outstanding synchronous call.
///
/// The first outcome written wins; later writes are ignored.
#[derive(Debug)]
pub struct SyncSlot {
    id: NotificationId,
    cache_key: String,
    outcome: OnceLock<SlotOutcome>,
}

impl SyncSlot {
    pub fn new(cache_key: String) -> Self {
        Self {
            id: NotificationId::new(),
            cache_key,
            outcome: OnceLock::new(),
        }
    }

    /// Correlation id carried by the outbound notification.
    pub fn id(&self) -> NotificationId {
        self.id
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Record an outcome. Returns `false` if one was already recorded.
    pub fn complete(&self, outcome: SlotOutcome) -> bool {
        self.outcome.set(outcome).is_ok()
    }

    pub fn outcome(&self) -> Option<&SlotOutcome> {
        self.outcome.get()
    }

    pub fn is_done(&self) -> bool {
        self.outcome.get().is_some()
    }
}
