//! # Shared Types Crate
//!
//! Domain entities and message shapes shared by every fleet crate.
//!
//! ## Contents
//!
//! - **Identity**: `NodeId`, `KeyId`, `NetworkId`, `DomainId`, `AccountId`,
//!   `NotificationId` and the externally owned `Node` record.
//! - **Time**: `Timestamp`, wall-clock milliseconds used on persisted records.
//! - **Notifications**: the `NotificationType` catalogue, the plaintext
//!   `NotificationMessage` carried inside envelopes, `NotificationReceipt`
//!   and the `SyncReply` payload used by reply types.
//!
//! ## Design Principles
//!
//! - **Plain data**: no I/O and no async here; behaviour lives in
//!   `fleet-notify`.
//! - **Stable wire names**: serde names are part of the wire protocol and must
//!   not be renamed casually.

pub mod entities;
pub mod errors;
pub mod notification;

pub use entities::*;
pub use errors::*;
pub use notification::*;
