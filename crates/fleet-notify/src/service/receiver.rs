//! # Notification Receiver
//!
//! Turns an inbound wire request into a persisted `ReceivedNotification`:
//! recipient key lookup, sender lookup, key discovery, origin check,
//! decryption, persistence, then a fire-and-forget hand-off to the inbox.

use std::sync::Arc;

use async_trait::async_trait;
use fleet_telemetry::metrics::{NOTIFICATIONS_RECEIVED, RECEIVE_REJECTIONS};
use fleet_telemetry::{log_event, log_notification_event};
use shared_crypto::open;
use shared_types::{Node, NotificationMessage, NotificationReceipt};

use super::inbox::{InboxHandle, InboxItem};
use super::key_discovery::{KeyClaim, KeyDiscovery};
use super::key_ring::KeyRing;
use crate::domain::{NotifyError, ReceivedNotification, Rejection};
use crate::ports::{InboundRequest, InboxRepository, NotificationInbound, Repository, TimeSource};

/// Inbound side of the protocol.
pub struct NotificationReceiver {
    keys: Arc<KeyRing>,
    discovery: Arc<KeyDiscovery>,
    nodes: Arc<dyn Repository<Node>>,
    inbox_repo: Arc<dyn InboxRepository>,
    inbox: InboxHandle,
    time: Arc<dyn TimeSource>,
    require_same_fleet: bool,
}

impl NotificationReceiver {
    pub fn new(
        keys: Arc<KeyRing>,
        discovery: Arc<KeyDiscovery>,
        nodes: Arc<dyn Repository<Node>>,
        inbox_repo: Arc<dyn InboxRepository>,
        inbox: InboxHandle,
        time: Arc<dyn TimeSource>,
        require_same_fleet: bool,
    ) -> Self {
        Self {
            keys,
            discovery,
            nodes,
            inbox_repo,
            inbox,
            time,
            require_same_fleet,
        }
    }

    /// Validate, decrypt, persist and queue an inbound notification.
    pub async fn receive(&self, request: InboundRequest) -> Result<NotificationReceipt, NotifyError> {
        let origin = request.origin;
        let from_node = request.from_node;
        let result = self.accept(request).await;
        if let Err(NotifyError::Forbidden(rejection)) = &result {
            RECEIVE_REJECTIONS
                .with_label_values(&[rejection.reason()])
                .inc();
            log_event!(
                warn,
                "receiver",
                "Rejected inbound notification",
                from_node = %from_node,
                origin = %origin,
                reason = rejection.reason()
            );
        }
        result
    }

    /// Same-node delivery without encryption.
    ///
    /// The row is handed to the inbox directly and never persisted, so a
    /// full queue is an error rather than something a sweep can recover.
    pub async fn receive_inline(
        &self,
        message: NotificationMessage,
    ) -> Result<NotificationReceipt, NotifyError> {
        let receipt = self.receipt_for(&message, self.keys.node().clone());
        let mut row = ReceivedNotification::new(message, None, self.time.now());
        row.receipt = Some(receipt.clone());

        log_notification_event!(
            debug,
            "receiver",
            "Inline notification",
            row.notification_id,
            row.notification_type
        );
        self.inbox.submit(InboxItem::Inline(row))?;
        NOTIFICATIONS_RECEIVED.inc();
        Ok(receipt)
    }

    async fn accept(&self, request: InboundRequest) -> Result<NotificationReceipt, NotifyError> {
        let to_key = self
            .keys
            .find(&request.to_key)
            .ok_or(Rejection::UnknownRecipientKey(request.to_key))?;

        let sender = self
            .nodes
            .find(&request.from_node)
            .await?
            .ok_or(Rejection::UnknownSender(request.from_node))?;
        if self.require_same_fleet && !sender.same_fleet(self.keys.node()) {
            return Err(Rejection::ForeignSender(sender.id).into());
        }

        let accepted = self
            .discovery
            .discover(&KeyClaim {
                from_node: sender.clone(),
                key_id: request.from_key,
                origin: request.origin,
                restore_token: request.restore_key.clone(),
                public_key: request.envelope.public_key,
            })
            .await?;

        // Loopback delivery uses the same key on both ends.
        if accepted.key.key_id != to_key.key_id() {
            let local = self.discovery.local_addresses();
            if !local.check(accepted.key.bound_origin, request.origin).is_match() {
                return Err(Rejection::OriginMismatch {
                    node_id: accepted.key.node_id,
                    key_id: accepted.key.key_id,
                    bound: accepted.key.bound_origin,
                    observed: request.origin,
                }
                .into());
            }
        }

        let plaintext = open(&request.envelope, &to_key.pair, &accepted.key.public_key)?;
        let message: NotificationMessage = serde_json::from_slice(&plaintext)
            .map_err(|e| NotifyError::Malformed(e.to_string()))?;
        if message.from_node != sender.id {
            return Err(NotifyError::Malformed(format!(
                "sealed sender {} does not match header {}",
                message.from_node, sender.id
            )));
        }
        if message.to_node != self.keys.node().id {
            return Err(NotifyError::Malformed(format!(
                "notification addressed to {}",
                message.to_node
            )));
        }

        let receipt = self.receipt_for(&message, sender);
        let mut row = ReceivedNotification::new(message, Some(accepted.key.key_id), self.time.now());
        row.receipt = Some(receipt.clone());
        let row = self.inbox_repo.create(row).await?;

        NOTIFICATIONS_RECEIVED.inc();
        log_notification_event!(
            debug,
            "receiver",
            "Stored inbound notification",
            row.notification_id,
            row.notification_type,
            row_id = %row.id,
            from_node = %row.from_node,
            path = accepted.path.as_str()
        );

        // The row is already durable; a sweep picks it up if the queue is full.
        if let Err(e) = self.inbox.submit(InboxItem::Stored(row.id)) {
            log_event!(debug, "receiver", "Inbox queue full, deferring to sweep", row_id = %row.id, error = %e);
        }
        Ok(receipt)
    }

    fn receipt_for(&self, message: &NotificationMessage, sender: Node) -> NotificationReceipt {
        if !message.resolve_nodes {
            return NotificationReceipt::default();
        }
        NotificationReceipt {
            resolved_sender: Some(sender),
            resolved_recipient: Some(self.keys.node().clone()),
        }
    }
}

#[async_trait]
impl NotificationInbound for NotificationReceiver {
    async fn receive(&self, request: InboundRequest) -> Result<NotificationReceipt, NotifyError> {
        NotificationReceiver::receive(self, request).await
    }
}
