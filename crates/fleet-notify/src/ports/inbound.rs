//! Inbound (Driving) ports.
//!
//! `NotificationInbound` is what the wire adapters call. Handlers are the
//! business collaborators the inbox dispatches to.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use shared_crypto::Envelope;
use shared_types::{KeyId, NodeId, NotificationReceipt, NotificationType, SyncReply};

use super::outbound::headers;
use crate::domain::{HandlerError, NotifyError, ReceivedNotification, Rejection};

/// A delivery as it arrived on the wire.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub envelope: Envelope,
    pub from_node: NodeId,
    pub from_key: KeyId,
    pub to_key: KeyId,
    /// Network-level peer address of the connection.
    pub origin: IpAddr,
    pub restore_key: Option<String>,
}

impl InboundRequest {
    /// Build from raw header lookups.
    ///
    /// A missing or unparsable identifying header is a protocol rejection.
    pub fn from_headers<'a, F>(envelope: Envelope, origin: IpAddr, header: F) -> Result<Self, Rejection>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let from_key = required(&header, headers::FROM_NODE_KEY)?;
        let from_node = required(&header, headers::FROM_NODE_UUID)?;
        let to_key = required(&header, headers::TO_NODE_KEY)?;
        let restore_key = header(headers::RESTORE_KEY)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(Self {
            envelope,
            from_node: from_node
                .parse()
                .map_err(|_| Rejection::InvalidHeader(headers::FROM_NODE_UUID))?,
            from_key: from_key
                .parse()
                .map_err(|_| Rejection::InvalidHeader(headers::FROM_NODE_KEY))?,
            to_key: to_key
                .parse()
                .map_err(|_| Rejection::InvalidHeader(headers::TO_NODE_KEY))?,
            origin,
            restore_key,
        })
    }
}

fn required<'a, F>(header: &F, name: &'static str) -> Result<&'a str, Rejection>
where
    F: Fn(&str) -> Option<&'a str>,
{
    header(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(Rejection::MissingHeader(name))
}

/// Accepts deliveries from the wire.
#[async_trait]
pub trait NotificationInbound: Send + Sync {
    async fn receive(&self, request: InboundRequest) -> Result<NotificationReceipt, NotifyError>;
}

/// Sends a handler's reply back to the requesting node.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(
        &self,
        request: &ReceivedNotification,
        reply: SyncReply,
    ) -> Result<NotificationReceipt, NotifyError>;
}

/// What a handler sees.
#[derive(Clone)]
pub struct HandlerContext {
    pub notification: ReceivedNotification,
    replies: Arc<dyn ReplySender>,
}

impl HandlerContext {
    pub fn new(notification: ReceivedNotification, replies: Arc<dyn ReplySender>) -> Self {
        Self {
            notification,
            replies,
        }
    }

    /// Decode the payload.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_value(self.notification.payload.clone())?)
    }

    /// Answer the sender's synchronous call.
    pub async fn respond(&self, response: serde_json::Value) -> Result<(), HandlerError> {
        let reply = SyncReply::ok(self.notification.notification_id, response);
        self.replies.reply(&self.notification, reply).await?;
        Ok(())
    }

    /// Report a failure to the sender's synchronous call.
    pub async fn respond_error(&self, exception: impl Into<String> + Send) -> Result<(), HandlerError> {
        let reply = SyncReply::failed(self.notification.notification_id, exception);
        self.replies.reply(&self.notification, reply).await?;
        Ok(())
    }
}

/// Business logic for one notification type.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext) -> Result<(), HandlerError>;
}

/// Looks up the handler for a type.
pub trait HandlerRegistry: Send + Sync {
    fn resolve(&self, notification_type: NotificationType) -> Option<Arc<dyn NotificationHandler>>;
}
