//! # Shared Cache
//!
//! Time-expiring, size-bounded maps for process-local protocol state such as
//! in-flight synchronous calls and reply waiters.
//!
//! ## Eviction Policy
//!
//! - Entries expire `ttl` after insertion and are never returned afterwards
//! - Expired entries are dropped lazily on access and by `purge_expired`
//! - When full, an insert first purges expired entries, then evicts the
//!   oldest entry

#![warn(clippy::all)]

mod expiring;

pub use expiring::{CacheStats, ExpiringCache};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
