//! # Fleet Notify
//!
//! Secure inter-node notifications for a fleet of autonomous nodes.
//!
//! ## Components
//!
//! | Service | Responsibility |
//! |---------|----------------|
//! | `KeyRing` | This node's own key pairs, generated and rotated on demand |
//! | `KeyDiscovery` | Decides whether a sender's claimed key is trusted |
//! | `NotificationReceiver` | Validates, decrypts and stores inbound notifications |
//! | `NotificationSender` | Seals and delivers outbound notifications |
//! | `SyncRpcEmulator` | Blocking call/response over notifications |
//! | `InboxProcessor` | Dispatches stored notifications to handlers |
//! | `StorageGate` | Origin-gated one-time payload reads |
//!
//! ## Architecture
//!
//! Hexagonal, like every other crate in the workspace:
//! - **Domain:** records, trust rules, errors, configuration
//! - **Ports:** `TrustStore`, `Repository`, `Transport` and friends
//! - **Service:** the protocol itself
//! - **Adapters:** in-memory stores, handler registry, HTTP (feature `http`)
//!
//! `NotifyStack::build` wires one node from its ports.
//!
//! ## Trust model
//!
//! A node's first key is accepted on first contact and binds the node to
//! the address it came from. Later keys are accepted from that address
//! only; a different address needs a restore token during the restore
//! window of the node's network.

#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod stack;

/// Test utilities (MockTimeSource, MockTransport, TestNode, ...)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Domain
pub use domain::{
    HandlerError, InboxConfig, KeyConfig, LocalAddresses, LocalDelivery, NodeKey, NotifyConfig,
    NotifyError, ProcessingStatus, ReceivedNotification, Rejection, SendStatus, SentNotification,
    StoreError, SyncConfig, SyncError, TransportError,
};

// Ports
pub use ports::{
    DeliveryHeaders, HandlerContext, HandlerRegistry, InboundRequest, InboxRepository,
    NetworkStateProvider, NotificationHandler, NotificationInbound, ReplySender, Repository,
    RestoreAuthority, StorageStream, SystemTimeSource, TimeSource, Transport, TrustStore,
};

// Services
pub use service::{
    AcceptPath, InboxProcessor, KeyDiscovery, KeyRing, NotificationReceiver, NotificationSender,
    StorageGate, SyncRegistry, SyncRpcEmulator,
};

pub use stack::{NotifyStack, StackPorts};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
