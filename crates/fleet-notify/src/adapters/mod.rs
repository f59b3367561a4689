//! Adapters (Driven side and wire).
//!
//! In-memory stores serve tests and single-process deployments; the HTTP
//! adapters are behind the `http` feature.

pub mod handlers;
pub mod memory;
pub mod registry;

#[cfg(feature = "http")]
pub mod http_server;
#[cfg(feature = "http")]
pub mod http_transport;

pub use handlers::{HealthCheckHandler, HealthStatus};
pub use memory::{
    InMemoryNetworkStates, InMemoryRepository, InMemoryStorageStream, InMemoryTrustStore,
    StaticRestoreAuthority,
};
pub use registry::StaticHandlerRegistry;

#[cfg(feature = "http")]
pub use http_server::{router, HttpState, DEFAULT_BODY_LIMIT};
#[cfg(feature = "http")]
pub use http_transport::HttpTransport;
