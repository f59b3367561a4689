//! # Integration Tests
//!
//! Node-to-node flows through the full receive path of each member:
//! headers, key discovery, envelope opening, inbox and handlers.

pub mod flows;
pub mod rotation;
