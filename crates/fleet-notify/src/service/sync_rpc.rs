//! # Synchronous RPC over notifications
//!
//! `call` sends a request notification and waits for the correlated reply.
//!
//! Identical concurrent calls (same target, type and `cache_key`) share one
//! outbound send when the type allows shared responses: the first caller
//! becomes the leader and sends, the others follow the leader's slot. Every
//! caller polls its slot at `sync.wait` plus jitter until `sync.timeout`.
//! The inbox completes slots through `SyncRegistry::complete`.
//!
//! In-flight state lives only in this process; a restart is equivalent to
//! a timeout for every waiting caller.

use std::sync::Arc;
use std::time::Duration;

use fleet_telemetry::log_notification_event;
use fleet_telemetry::metrics::{SYNC_CALLS, SYNC_OUTCOMES, SYNC_WAIT_DURATION};
use rand::Rng;
use serde::de::DeserializeOwned;
use shared_cache::ExpiringCache;
use shared_types::{NodeId, NotificationId, NotificationType, SyncReply};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::sender::NotificationSender;
use crate::domain::{NotifyError, SlotOutcome, SyncConfig, SyncError, SyncRequest, SyncSlot};
use crate::ports::TimeSource;

/// Shared tables of outstanding synchronous calls.
///
/// `in_flight` maps a call key to the slot identical callers join;
/// `waiters` maps a correlation id to the slot a reply resolves. Entries
/// expire on their own so a lost reply cannot pin memory.
pub struct SyncRegistry {
    in_flight: ExpiringCache<String, SyncSlot>,
    waiters: ExpiringCache<NotificationId, Arc<SyncSlot>>,
}

impl SyncRegistry {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            in_flight: ExpiringCache::new("sync_in_flight", config.in_flight_ttl, config.max_entries),
            waiters: ExpiringCache::new("sync_waiters", config.waiter_ttl(), config.max_entries),
        }
    }

    /// Register a slot to be resolved by a reply carrying its id.
    pub fn register_waiter(&self, slot: Arc<SyncSlot>) {
        self.waiters.insert(slot.id(), slot);
    }

    /// Resolve the waiter for `reply`. Returns `false` if nobody is waiting.
    ///
    /// First write wins; a second reply for the same id is a no-op.
    pub fn complete(&self, reply: SyncReply) -> bool {
        let Some(slot) = self.waiters.remove(&reply.notification_id) else {
            return false;
        };
        let outcome = match reply.exception {
            Some(exception) => SlotOutcome::Exception(exception),
            None => SlotOutcome::Response(reply.response.unwrap_or(serde_json::Value::Null)),
        };
        slot.complete(outcome);
        true
    }

    /// Number of callers still waiting for a reply.
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop expired entries from both tables.
    pub fn purge_expired(&self) -> usize {
        self.in_flight.purge_expired() + self.waiters.purge_expired()
    }

    /// Spawn a periodic purge.
    pub fn spawn_purge(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.purge_expired();
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    fn forget(&self, key: &str, slot: &Arc<SyncSlot>) {
        self.waiters.remove(&slot.id());
        self.in_flight.remove_if_same(&key.to_string(), slot);
    }
}

/// Blocking call/response on top of `NotificationSender`.
pub struct SyncRpcEmulator {
    sender: Arc<NotificationSender>,
    registry: Arc<SyncRegistry>,
    time: Arc<dyn TimeSource>,
    config: SyncConfig,
}

impl SyncRpcEmulator {
    pub fn new(
        sender: Arc<NotificationSender>,
        registry: Arc<SyncRegistry>,
        time: Arc<dyn TimeSource>,
        config: SyncConfig,
    ) -> Self {
        Self {
            sender,
            registry,
            time,
            config,
        }
    }

    /// Call and decode the response.
    pub async fn call<R, T>(
        &self,
        target: &NodeId,
        notification_type: NotificationType,
        request: &R,
    ) -> Result<T, SyncError>
    where
        R: SyncRequest,
        T: DeserializeOwned,
    {
        let value = self.call_value(target, notification_type, request).await?;
        serde_json::from_value(value).map_err(|e| SyncError::InvalidReply(e.to_string()))
    }

    /// Call and return the raw response.
    pub async fn call_value<R: SyncRequest>(
        &self,
        target: &NodeId,
        notification_type: NotificationType,
        request: &R,
    ) -> Result<serde_json::Value, SyncError> {
        let payload = serde_json::to_value(request)
            .map_err(|e| SyncError::Send(Arc::new(NotifyError::Serialization(e))))?;
        let key = format!("{target}:{notification_type}:{}", request.cache_key());
        let shareable =
            notification_type.can_return_cached_response() && self.time.offset_ms() == 0;

        let (slot, leader) = if shareable {
            self.registry
                .in_flight
                .get_or_insert_with(key.clone(), || SyncSlot::new(key.clone()))
        } else {
            (Arc::new(SyncSlot::new(key.clone())), true)
        };
        SYNC_CALLS
            .with_label_values(&[if leader { "leader" } else { "follower" }])
            .inc();

        let started = Instant::now();
        let deadline = started + self.config.timeout;
        if leader {
            self.registry.register_waiter(Arc::clone(&slot));
            let sent = self
                .sender
                .send_with_id(slot.id(), target, notification_type, payload, false)
                .await;
            if let Err(e) = sent {
                let e = Arc::new(e);
                slot.complete(SlotOutcome::SendFailed(Arc::clone(&e)));
                self.registry.forget(&key, &slot);
                SYNC_OUTCOMES.with_label_values(&["send_error"]).inc();
                return Err(SyncError::Send(e));
            }
        }

        let outcome = self.wait_for(&slot, deadline).await;
        SYNC_WAIT_DURATION.observe(started.elapsed().as_secs_f64());

        match outcome {
            Some(SlotOutcome::Response(value)) => {
                SYNC_OUTCOMES.with_label_values(&["response"]).inc();
                Ok(value)
            }
            Some(SlotOutcome::Exception(exception)) => {
                SYNC_OUTCOMES.with_label_values(&["remote_error"]).inc();
                Err(SyncError::Remote(exception))
            }
            Some(SlotOutcome::SendFailed(e)) => {
                SYNC_OUTCOMES.with_label_values(&["send_error"]).inc();
                Err(SyncError::Send(e))
            }
            None => {
                self.registry.forget(&key, &slot);
                SYNC_OUTCOMES.with_label_values(&["timeout"]).inc();
                log_notification_event!(
                    warn,
                    "sync_rpc",
                    "No reply before timeout",
                    slot.id(),
                    notification_type,
                    target = %target,
                    waited_ms = started.elapsed().as_millis() as u64
                );
                Err(SyncError::Timeout {
                    notification_id: slot.id(),
                    waited: started.elapsed(),
                })
            }
        }
    }

    /// Poll `slot` until it completes or `deadline` passes.
    async fn wait_for(&self, slot: &SyncSlot, deadline: Instant) -> Option<SlotOutcome> {
        loop {
            if let Some(outcome) = slot.outcome() {
                return Some(outcome.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let nap = (self.config.wait + self.jitter()).min(deadline - now);
            tokio::time::sleep(nap).await;
        }
    }

    fn jitter(&self) -> Duration {
        let max = self.config.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}
