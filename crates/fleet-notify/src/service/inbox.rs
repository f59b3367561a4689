//! # Inbox Processor
//!
//! Dispatches received notifications to their handlers.
//!
//! Work arrives on a bounded queue (fed by the receiver and by the periodic
//! sweep) and runs on a fixed number of workers. A stored row is claimed
//! atomically (`new` to `processing`) before its handler runs, so a crash
//! mid-handling leaves it visibly `processing` and two processors never
//! dispatch the same row. Outcomes are terminal: nothing is retried.
//!
//! Reply types are not handed to a handler; they resolve the waiting
//! synchronous call through the shared `SyncRegistry`.

use std::collections::HashSet;
use std::sync::Arc;

use fleet_telemetry::metrics::{INBOX_PROCESSED, INBOX_QUEUED};
use fleet_telemetry::{log_event, log_notification_event};
use parking_lot::Mutex;
use shared_types::{NotificationId, SyncReply};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::sync_rpc::SyncRegistry;
use crate::domain::{
    HandlerError, InboxConfig, NotifyError, ProcessingStatus, ReceivedNotification,
};
use crate::ports::{HandlerContext, HandlerRegistry, InboxRepository, ReplySender, TimeSource};

/// Unit of inbox work.
#[derive(Debug, Clone)]
pub enum InboxItem {
    /// A persisted row to claim and dispatch.
    Stored(NotificationId),
    /// An inline delivery that was never persisted.
    Inline(ReceivedNotification),
}

/// Producer side of the inbox queue.
///
/// A stored row id is queued at most once at a time; it can be queued again
/// after the consumer has taken it.
#[derive(Debug, Clone)]
pub struct InboxHandle {
    tx: mpsc::Sender<InboxItem>,
    queued: Arc<Mutex<HashSet<NotificationId>>>,
}

impl InboxHandle {
    /// Bounded queue of `depth` items.
    pub fn channel(depth: usize) -> (InboxHandle, InboxQueue) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let queued = Arc::new(Mutex::new(HashSet::new()));
        (
            InboxHandle {
                tx,
                queued: Arc::clone(&queued),
            },
            InboxQueue { rx, queued },
        )
    }

    /// Queue without waiting. Returns `false` when the stored row is already
    /// waiting in the queue. Fails with `InboxFull` when the queue is at
    /// capacity or the processor is gone.
    pub fn submit(&self, item: InboxItem) -> Result<bool, NotifyError> {
        let stored = match &item {
            InboxItem::Stored(id) => Some(*id),
            InboxItem::Inline(_) => None,
        };
        if let Some(id) = stored {
            if !self.queued.lock().insert(id) {
                return Ok(false);
            }
        }
        if self.tx.try_send(item).is_err() {
            if let Some(id) = stored {
                self.queued.lock().remove(&id);
            }
            return Err(NotifyError::InboxFull);
        }
        INBOX_QUEUED.inc();
        Ok(true)
    }
}

/// Consumer side of the inbox queue.
#[derive(Debug)]
pub struct InboxQueue {
    rx: mpsc::Receiver<InboxItem>,
    queued: Arc<Mutex<HashSet<NotificationId>>>,
}

impl InboxQueue {
    pub async fn next(&mut self) -> Option<InboxItem> {
        let item = self.rx.recv().await;
        self.taken(item)
    }

    pub fn try_next(&mut self) -> Option<InboxItem> {
        let item = self.rx.try_recv().ok();
        self.taken(item)
    }

    fn taken(&self, item: Option<InboxItem>) -> Option<InboxItem> {
        match &item {
            Some(InboxItem::Stored(id)) => {
                self.queued.lock().remove(id);
                INBOX_QUEUED.dec();
            }
            Some(InboxItem::Inline(_)) => INBOX_QUEUED.dec(),
            None => {}
        }
        item
    }
}

/// Background dispatcher.
pub struct InboxProcessor {
    repo: Arc<dyn InboxRepository>,
    handlers: Arc<dyn HandlerRegistry>,
    replies: Arc<dyn ReplySender>,
    sync: Arc<SyncRegistry>,
    time: Arc<dyn TimeSource>,
    handle: InboxHandle,
    workers: Arc<Semaphore>,
    config: InboxConfig,
}

impl InboxProcessor {
    pub fn new(
        repo: Arc<dyn InboxRepository>,
        handlers: Arc<dyn HandlerRegistry>,
        replies: Arc<dyn ReplySender>,
        sync: Arc<SyncRegistry>,
        time: Arc<dyn TimeSource>,
        handle: InboxHandle,
        config: InboxConfig,
    ) -> Self {
        Self {
            repo,
            handlers,
            replies,
            sync,
            time,
            handle,
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            config,
        }
    }

    /// Drain the queue until shutdown, one task per item, at most
    /// `workers` at a time.
    pub async fn run(self: Arc<Self>, mut queue: InboxQueue, mut shutdown: watch::Receiver<bool>) {
        log_event!(info, "inbox", "Inbox processor started", workers = self.config.workers);
        loop {
            let item = tokio::select! {
                item = queue.next() => item,
                _ = shutdown.changed() => None,
            };
            let Some(item) = item else { break };

            let permit = match Arc::clone(&self.workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let processor = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = processor.process(item).await {
                    log_event!(error, "inbox", "Inbox item failed", error = %e);
                }
                drop(permit);
            });
        }
        log_event!(info, "inbox", "Inbox processor stopped");
    }

    /// Spawn the periodic `check_inbox` sweep.
    pub fn spawn_sweep(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.check_inbox().await {
                            log_event!(warn, "inbox", "Inbox sweep failed", error = %e);
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    /// Queue rows still marked `new`. Returns how many were queued.
    ///
    /// Rows already waiting in the queue are skipped. Stops at the first
    /// refusal; the rest stay `new` for the next sweep.
    pub async fn check_inbox(&self) -> Result<usize, NotifyError> {
        let rows = self.repo.find_new(self.config.sweep_batch).await?;
        let mut queued = 0;
        for row in rows {
            match self.handle.submit(InboxItem::Stored(row.id)) {
                Ok(true) => queued += 1,
                Ok(false) => {}
                Err(_) => break,
            }
        }
        if queued > 0 {
            log_event!(debug, "inbox", "Sweep queued notifications", queued = queued);
        }
        Ok(queued)
    }

    /// Process one item to a terminal status.
    ///
    /// Returns `None` when a stored row was already claimed elsewhere.
    pub async fn process(&self, item: InboxItem) -> Result<Option<ProcessingStatus>, NotifyError> {
        match item {
            InboxItem::Stored(id) => {
                let Some(row) = self.repo.claim(&id, self.time.now()).await? else {
                    log_event!(debug, "inbox", "Notification already claimed", row_id = %id);
                    return Ok(None);
                };
                let row = self.finish(row).await?;
                self.repo.update(row.clone()).await?;
                Ok(Some(row.processing_status))
            }
            InboxItem::Inline(mut row) => {
                row.advance(ProcessingStatus::Processing, self.time.now())?;
                let row = self.finish(row).await?;
                Ok(Some(row.processing_status))
            }
        }
    }

    async fn finish(&self, mut row: ReceivedNotification) -> Result<ReceivedNotification, NotifyError> {
        let outcome = self.dispatch(&row).await;
        let now = self.time.now();
        match outcome {
            Ok(label) => {
                row.advance(ProcessingStatus::Completed, now)?;
                INBOX_PROCESSED.with_label_values(&[label]).inc();
            }
            Err(e) => {
                log_notification_event!(
                    error,
                    "inbox",
                    "Handler failed",
                    row.notification_id,
                    row.notification_type,
                    row_id = %row.id,
                    error = %e
                );
                row.advance(ProcessingStatus::Error, now)?;
                row.exception = Some(e.to_string());
                INBOX_PROCESSED.with_label_values(&["error"]).inc();
            }
        }
        Ok(row)
    }

    async fn dispatch(&self, row: &ReceivedNotification) -> Result<&'static str, HandlerError> {
        if row.notification_type.is_response() {
            let reply: SyncReply = serde_json::from_value(row.payload.clone())?;
            if self.sync.complete(reply.clone()) {
                return Ok("reply");
            }
            log_notification_event!(
                warn,
                "inbox",
                "Reply has no waiting caller",
                reply.notification_id,
                row.notification_type,
                from_node = %row.from_node
            );
            return Ok("unmatched_reply");
        }

        let handler = self
            .handlers
            .resolve(row.notification_type)
            .ok_or(HandlerError::NoHandler(row.notification_type))?;
        let ctx = HandlerContext::new(row.clone(), Arc::clone(&self.replies));
        handler.handle(&ctx).await?;
        Ok("completed")
    }
}
