//! Application services.

pub mod inbox;
pub mod key_discovery;
pub mod key_ring;
pub mod receiver;
pub mod sender;
pub mod storage_gate;
pub mod sync_rpc;

pub use inbox::{InboxHandle, InboxItem, InboxProcessor, InboxQueue};
pub use key_discovery::{AcceptPath, AcceptedKey, KeyClaim, KeyDiscovery};
pub use key_ring::KeyRing;
pub use receiver::NotificationReceiver;
pub use sender::{NotificationSender, Strategy};
pub use storage_gate::StorageGate;
pub use sync_rpc::{SyncRegistry, SyncRpcEmulator};
