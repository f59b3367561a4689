//! # Node Runtime Library
//!
//! Configuration, wiring and lifecycle of a fleet node. The `fleet-node`
//! binary is a thin shell around [`NodeRuntime`].
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `FLEET_*` overrides)
//! 2. Initialize telemetry
//! 3. Build the notification stack and seed configured peers
//! 4. Start the inbox dispatcher, inbox sweep and sync table purge
//! 5. Serve the notification API until Ctrl-C

#![warn(clippy::all)]

pub mod config;
pub mod container;
pub mod runtime;

pub use config::{HttpConfig, IdentityConfig, NodeConfig, NodeConfigError, PeerConfig};
pub use container::{ContainerError, NodeContainer};
pub use runtime::NodeRuntime;
