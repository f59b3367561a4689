//! Domain layer: trust records, notification records, protocol errors and
//! configuration. No I/O.

pub mod config;
pub mod errors;
pub mod node_key;
pub mod origin;
pub mod records;
pub mod sync;

pub use config::{ConfigError, InboxConfig, KeyConfig, LocalDelivery, NotifyConfig, SyncConfig};
pub use errors::{HandlerError, NotifyError, Rejection, StoreError, SyncError, TransportError};
pub use node_key::{all_expire_within, LocalKey, NodeKey};
pub use origin::{LocalAddresses, OriginMatch};
pub use records::{
    ProcessingStatus, ReceivedNotification, Record, SendStatus, SentNotification,
};
pub use sync::{SlotOutcome, SyncRequest, SyncSlot};
