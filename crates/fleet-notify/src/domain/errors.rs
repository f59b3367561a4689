//! Error types for the notification core.
//!
//! Callers must be able to tell "not trusted" from "could not reach":
//! protocol rejections are `NotifyError::Forbidden`, transport trouble is
//! `NotifyError::Transient`, and neither is folded into the other.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use shared_crypto::CryptoError;
use shared_types::{KeyId, NodeId, NotificationId, NotificationType};
use thiserror::Error;

/// Why an inbound notification was refused.
///
/// Every variant is attacker-reachable and maps to `403 Forbidden`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing required header {0}")]
    MissingHeader(&'static str),

    #[error("malformed header {0}")]
    InvalidHeader(&'static str),

    #[error("unknown sender node {0}")]
    UnknownSender(NodeId),

    #[error("sender node {0} is outside this node's network, domain or account")]
    ForeignSender(NodeId),

    #[error("recipient key {0} is not one of this node's keys")]
    UnknownRecipientKey(KeyId),

    #[error("key {key_id} of node {node_id} is bound to {bound}, request came from {observed}")]
    OriginMismatch {
        node_id: NodeId,
        key_id: KeyId,
        bound: IpAddr,
        observed: IpAddr,
    },

    #[error("node {node_id} is bound to {bound}, request came from {observed}")]
    NodeOriginChanged {
        node_id: NodeId,
        bound: IpAddr,
        observed: IpAddr,
    },

    #[error("key {key_id} of node {node_id} is not trusted")]
    KeyNotTrusted { node_id: NodeId, key_id: KeyId },

    #[error("read registered for node {node_id} requested from {observed}")]
    ReaderOriginMismatch { node_id: NodeId, observed: IpAddr },

    #[error("remote node refused the notification")]
    RemoteForbidden,
}

impl Rejection {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingHeader(_) => "missing_header",
            Rejection::InvalidHeader(_) => "invalid_header",
            Rejection::UnknownSender(_) => "unknown_sender",
            Rejection::ForeignSender(_) => "foreign_sender",
            Rejection::UnknownRecipientKey(_) => "unknown_recipient_key",
            Rejection::OriginMismatch { .. } => "origin_mismatch",
            Rejection::NodeOriginChanged { .. } => "node_origin_changed",
            Rejection::KeyNotTrusted { .. } => "key_not_trusted",
            Rejection::ReaderOriginMismatch { .. } => "reader_origin_mismatch",
            Rejection::RemoteForbidden => "remote_forbidden",
        }
    }
}

/// Persistence failures reported by repositories and the trust store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Failures of `Transport::post`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connect, timeout or name resolution failure. Safe to retry.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// The remote node answered 403.
    #[error("remote node answered forbidden")]
    Forbidden,

    /// Any other non-success status.
    #[error("remote node answered {status}: {body}")]
    Remote { status: u16, body: String },

    /// 2xx with a body that is not a receipt.
    #[error("invalid receipt: {0}")]
    InvalidResponse(String),
}

/// Errors from sending or receiving notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Protocol rejection. Not retryable without changing trust state.
    #[error("forbidden: {0}")]
    Forbidden(#[from] Rejection),

    /// Could not reach the remote node. The caller may retry with backoff.
    #[error("transient delivery failure to {uri}: {reason}")]
    Transient { uri: String, reason: String },

    /// The remote node failed the request.
    #[error("delivery to {uri} failed with status {status}: {body}")]
    Remote { uri: String, status: u16, body: String },

    /// Malformed envelope or key mismatch after key discovery.
    #[error("decryption failed: {0}")]
    Decryption(#[from] CryptoError),

    /// Plaintext did not decode into a notification.
    #[error("malformed notification: {0}")]
    Malformed(String),

    #[error("unknown target node {0}")]
    UnknownNode(NodeId),

    #[error("no trusted key for target node {0}")]
    NoRecipientKey(NodeId),

    #[error("no usable local key")]
    NoLocalKey,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("inbox is at capacity")]
    InboxFull,

    #[error("invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: NotificationId,
        from: &'static str,
        to: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NotifyError {
    /// Protocol rejection, local or reported by the remote end.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, NotifyError::Forbidden(_))
    }

    /// Only transport-level failures are worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotifyError::Transient { .. })
    }

    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            NotifyError::Forbidden(_) => "forbidden",
            NotifyError::Transient { .. } => "transient",
            _ => "error",
        }
    }

    pub(crate) fn from_transport(uri: &str, err: TransportError) -> Self {
        match err {
            TransportError::Transient(reason) => NotifyError::Transient {
                uri: uri.to_string(),
                reason,
            },
            TransportError::Forbidden => NotifyError::Forbidden(Rejection::RemoteForbidden),
            TransportError::Remote { status, body } => NotifyError::Remote {
                uri: uri.to_string(),
                status,
                body,
            },
            TransportError::InvalidResponse(reason) => NotifyError::Malformed(reason),
        }
    }
}

/// Errors from a synchronous call.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No reply arrived within the wait budget.
    #[error("no reply to {notification_id} within {waited:?}")]
    Timeout {
        notification_id: NotificationId,
        waited: Duration,
    },

    /// The remote handler reported a failure.
    #[error("remote handler failed: {0}")]
    Remote(String),

    /// The outbound send failed. Shared with followers of the same call.
    #[error("send failed: {0}")]
    Send(Arc<NotifyError>),

    /// The reply did not decode into the expected type.
    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

impl SyncError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout { .. })
    }
}

/// Errors raised by notification handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("no handler registered for {0}")]
    NoHandler(NotificationType),

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("handler failed: {0}")]
    Failed(String),

    #[error("reply failed: {0}")]
    Reply(#[from] NotifyError),
}
