//! Port definitions for the notification core.

pub mod inbound;
pub mod outbound;

pub use inbound::{
    HandlerContext, HandlerRegistry, InboundRequest, NotificationHandler, NotificationInbound,
    ReplySender,
};
pub use outbound::{
    headers, DeliveryHeaders, InboxRepository, NetworkStateProvider, Repository,
    RestoreAuthority, StorageStream, StorageTicket, SystemTimeSource, TimeSource, Transport,
    TrustStore,
};
