//! # Notification Sender
//!
//! Records and delivers outbound notifications.
//!
//! Strategies:
//! - **inline**: target is this node and inline delivery is configured; the
//!   plaintext goes straight to the inbox.
//! - **loopback**: target is this node; the message is sealed to our own key
//!   and runs through the full receive path without a network hop.
//! - **remote**: sealed to the target's newest trusted key and posted to its
//!   notify endpoint.
//!
//! The `SentNotification` row is written with its terminal status before
//! the result is returned.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use fleet_telemetry::log_notification_event;
use fleet_telemetry::metrics::{DELIVERY_DURATION, NOTIFICATIONS_SENT};
use parking_lot::RwLock;
use shared_crypto::seal;
use shared_types::{
    Node, NodeId, NotificationId, NotificationMessage, NotificationReceipt, NotificationType,
    SyncReply,
};
use tokio::time::Instant;

use super::key_ring::KeyRing;
use super::receiver::NotificationReceiver;
use crate::domain::{
    LocalDelivery, NotifyError, ReceivedNotification, SendStatus, SentNotification,
};
use crate::ports::{
    DeliveryHeaders, InboundRequest, ReplySender, Repository, TimeSource, Transport, TrustStore,
};

/// Delivery strategy chosen for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Inline,
    Loopback,
    Remote,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Inline => "inline",
            Strategy::Loopback => "loopback",
            Strategy::Remote => "remote",
        }
    }
}

/// Outbound side of the protocol.
pub struct NotificationSender {
    keys: Arc<KeyRing>,
    trust: Arc<dyn TrustStore>,
    nodes: Arc<dyn Repository<Node>>,
    sent: Arc<dyn Repository<SentNotification>>,
    transport: Arc<dyn Transport>,
    receiver: Arc<NotificationReceiver>,
    time: Arc<dyn TimeSource>,
    local_delivery: LocalDelivery,
    restore_key: RwLock<Option<String>>,
}

impl NotificationSender {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        keys: Arc<KeyRing>,
        trust: Arc<dyn TrustStore>,
        nodes: Arc<dyn Repository<Node>>,
        sent: Arc<dyn Repository<SentNotification>>,
        transport: Arc<dyn Transport>,
        receiver: Arc<NotificationReceiver>,
        time: Arc<dyn TimeSource>,
        local_delivery: LocalDelivery,
    ) -> Self {
        Self {
            keys,
            trust,
            nodes,
            sent,
            transport,
            receiver,
            time,
            local_delivery,
            restore_key: RwLock::new(None),
        }
    }

    /// Restore token presented with every remote delivery until cleared.
    pub fn set_restore_key(&self, token: Option<String>) {
        *self.restore_key.write() = token;
    }

    /// Send a notification with a fresh correlation id.
    pub async fn send(
        &self,
        target: &NodeId,
        notification_type: NotificationType,
        payload: serde_json::Value,
        resolve_nodes: bool,
    ) -> Result<NotificationReceipt, NotifyError> {
        self.send_with_id(NotificationId::new(), target, notification_type, payload, resolve_nodes)
            .await
    }

    /// Send under a caller-chosen correlation id.
    pub async fn send_with_id(
        &self,
        id: NotificationId,
        target: &NodeId,
        notification_type: NotificationType,
        payload: serde_json::Value,
        resolve_nodes: bool,
    ) -> Result<NotificationReceipt, NotifyError> {
        let target_node = self
            .nodes
            .find(target)
            .await?
            .ok_or(NotifyError::UnknownNode(*target))?;

        let message = NotificationMessage {
            id,
            notification_type,
            from_node: self.keys.node().id,
            to_node: target_node.id,
            resolve_nodes,
            payload,
        };
        let strategy = self.strategy_for(&target_node);
        let uri = (strategy == Strategy::Remote).then(|| target_node.notify_uri());

        let mut record = self
            .sent
            .create(SentNotification::new(&message, uri.clone(), self.time.now()))
            .await?;
        record.advance(SendStatus::Sending, self.time.now())?;
        let mut record = self.sent.update(record).await?;

        let result = match strategy {
            Strategy::Inline => self.receiver.receive_inline(message).await,
            Strategy::Loopback => self.deliver_loopback(&message).await,
            Strategy::Remote => {
                let uri = uri.unwrap_or_else(|| target_node.notify_uri());
                self.deliver_remote(&target_node, &uri, &message).await
            }
        };

        match result {
            Ok(receipt) => {
                record.mark_sent(receipt.clone(), self.time.now())?;
                self.sent.update(record).await?;
                NOTIFICATIONS_SENT
                    .with_label_values(&[strategy.as_str(), "sent"])
                    .inc();
                log_notification_event!(
                    debug,
                    "sender",
                    "Notification sent",
                    id,
                    notification_type,
                    to_node = %target,
                    strategy = strategy.as_str()
                );
                Ok(receipt)
            }
            Err(e) => {
                record.mark_error(e.to_string(), self.time.now())?;
                self.sent.update(record).await?;
                NOTIFICATIONS_SENT
                    .with_label_values(&[strategy.as_str(), e.outcome()])
                    .inc();
                log_notification_event!(
                    warn,
                    "sender",
                    "Notification delivery failed",
                    id,
                    notification_type,
                    to_node = %target,
                    strategy = strategy.as_str(),
                    error = %e
                );
                Err(e)
            }
        }
    }

    fn strategy_for(&self, target: &Node) -> Strategy {
        if target.id != self.keys.node().id {
            return Strategy::Remote;
        }
        match self.local_delivery {
            LocalDelivery::Inline => Strategy::Inline,
            LocalDelivery::Loopback => Strategy::Loopback,
        }
    }

    async fn deliver_loopback(
        &self,
        message: &NotificationMessage,
    ) -> Result<NotificationReceipt, NotifyError> {
        let local = self.keys.current().await?;
        let plaintext = serde_json::to_vec(message)?;
        let envelope = seal(&plaintext, &local.pair, &local.record.public_key)?;
        self.receiver
            .receive(InboundRequest {
                envelope,
                from_node: message.from_node,
                from_key: local.key_id(),
                to_key: local.key_id(),
                origin: IpAddr::V4(Ipv4Addr::LOCALHOST),
                restore_key: None,
            })
            .await
    }

    async fn deliver_remote(
        &self,
        target: &Node,
        uri: &str,
        message: &NotificationMessage,
    ) -> Result<NotificationReceipt, NotifyError> {
        let recipient = self
            .trust
            .find_current_keys(&target.id, self.time.now())
            .await?
            .into_iter()
            .max_by_key(|k| k.expires_at)
            .ok_or(NotifyError::NoRecipientKey(target.id))?;
        let local = self.keys.current().await?;

        let plaintext = serde_json::to_vec(message)?;
        let envelope = seal(&plaintext, &local.pair, &recipient.public_key)?;
        let headers = DeliveryHeaders {
            from_node: message.from_node,
            from_key: local.key_id(),
            to_key: recipient.key_id,
            restore_key: self.restore_key.read().clone(),
        };

        let started = Instant::now();
        let result = self.transport.post(uri, &headers, &envelope).await;
        DELIVERY_DURATION.observe(started.elapsed().as_secs_f64());
        result.map_err(|e| NotifyError::from_transport(uri, e))
    }
}

#[async_trait]
impl ReplySender for NotificationSender {
    /// Answer `request` with its family's reply type.
    async fn reply(
        &self,
        request: &ReceivedNotification,
        reply: SyncReply,
    ) -> Result<NotificationReceipt, NotifyError> {
        let reply_type = request.notification_type.reply_type().ok_or_else(|| {
            NotifyError::Malformed(format!(
                "{} has no reply type",
                request.notification_type
            ))
        })?;
        let payload = serde_json::to_value(&reply)?;
        self.send(&request.from_node, reply_type, payload, false).await
    }
}
