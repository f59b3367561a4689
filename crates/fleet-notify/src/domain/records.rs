//! Durable records of outbound and inbound notifications.
//!
//! Both status machines only move forward and stop at a terminal state.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use shared_types::{
    KeyId, Node, NodeId, NotificationId, NotificationMessage, NotificationReceipt,
    NotificationType, Timestamp,
};

use super::errors::NotifyError;

/// Anything a `Repository` can store.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Eq + Hash + Clone + Send + Sync + fmt::Display + 'static;

    const ENTITY: &'static str;

    fn record_id(&self) -> Self::Id;
}

impl Record for Node {
    type Id = NodeId;
    const ENTITY: &'static str = "node";

    fn record_id(&self) -> NodeId {
        self.id
    }
}

// =============================================================================
// SENT
// =============================================================================

/// Outbound delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Created,
    Sending,
    Sent,
    Error,
}

impl SendStatus {
    fn rank(&self) -> u8 {
        match self {
            SendStatus::Created => 0,
            SendStatus::Sending => 1,
            SendStatus::Sent | SendStatus::Error => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::Created => "created",
            SendStatus::Sending => "sending",
            SendStatus::Sent => "sent",
            SendStatus::Error => "error",
        }
    }
}

/// A notification this node sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentNotification {
    /// Correlation id shared with the receiver.
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub target_uri: Option<String>,
    pub payload: serde_json::Value,
    pub status: SendStatus,
    pub receipt: Option<NotificationReceipt>,
    pub exception: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SentNotification {
    pub fn new(message: &NotificationMessage, target_uri: Option<String>, now: Timestamp) -> Self {
        Self {
            id: message.id,
            notification_type: message.notification_type,
            from_node: message.from_node,
            to_node: message.to_node,
            target_uri,
            payload: message.payload.clone(),
            status: SendStatus::Created,
            receipt: None,
            exception: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, refusing to go backwards or leave a terminal state.
    pub fn advance(&mut self, next: SendStatus, now: Timestamp) -> Result<(), NotifyError> {
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return Err(NotifyError::InvalidTransition {
                id: self.id,
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_sent(&mut self, receipt: NotificationReceipt, now: Timestamp) -> Result<(), NotifyError> {
        self.advance(SendStatus::Sent, now)?;
        self.receipt = Some(receipt);
        Ok(())
    }

    pub fn mark_error(&mut self, exception: String, now: Timestamp) -> Result<(), NotifyError> {
        self.advance(SendStatus::Error, now)?;
        self.exception = Some(exception);
        Ok(())
    }
}

impl Record for SentNotification {
    type Id = NotificationId;
    const ENTITY: &'static str = "sent notification";

    fn record_id(&self) -> NotificationId {
        self.id
    }
}

// =============================================================================
// RECEIVED
// =============================================================================

/// Inbound processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    New,
    Processing,
    Completed,
    Error,
}

impl ProcessingStatus {
    fn rank(&self) -> u8 {
        match self {
            ProcessingStatus::New => 0,
            ProcessingStatus::Processing => 1,
            ProcessingStatus::Completed | ProcessingStatus::Error => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::New => "new",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Error => "error",
        }
    }
}

/// A notification this node received.
///
/// Every delivery gets its own row, so a replayed message produces a second
/// row with the same `notification_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedNotification {
    /// Row id.
    pub id: NotificationId,
    /// Correlation id chosen by the sender.
    pub notification_id: NotificationId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub from_node: NodeId,
    pub to_node: NodeId,
    /// Sender key the message was accepted under; `None` for inline delivery.
    pub from_key: Option<KeyId>,
    pub payload: serde_json::Value,
    pub processing_status: ProcessingStatus,
    pub receipt: Option<NotificationReceipt>,
    pub exception: Option<String>,
    pub received_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ReceivedNotification {
    pub fn new(message: NotificationMessage, from_key: Option<KeyId>, now: Timestamp) -> Self {
        Self {
            id: NotificationId::new(),
            notification_id: message.id,
            notification_type: message.notification_type,
            from_node: message.from_node,
            to_node: message.to_node,
            from_key,
            payload: message.payload,
            processing_status: ProcessingStatus::New,
            receipt: None,
            exception: None,
            received_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, refusing to go backwards or leave a terminal state.
    pub fn advance(&mut self, next: ProcessingStatus, now: Timestamp) -> Result<(), NotifyError> {
        if self.processing_status.is_terminal() || next.rank() <= self.processing_status.rank() {
            return Err(NotifyError::InvalidTransition {
                id: self.id,
                from: self.processing_status.as_str(),
                to: next.as_str(),
            });
        }
        self.processing_status = next;
        self.updated_at = now;
        Ok(())
    }
}

impl Record for ReceivedNotification {
    type Id = NotificationId;
    const ENTITY: &'static str = "received notification";

    fn record_id(&self) -> NotificationId {
        self.id
    }
}
