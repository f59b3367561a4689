//! # Fleet Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fleet.rs          # In-process multi-node fixture
//! ├── benchmarks/       # Codec and key discovery benchmarks
//! ├── exploits/         # Attack simulations against the receive path
//! └── integration/      # Node-to-node flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p fleet-tests
//!
//! # By category
//! cargo test -p fleet-tests integration::
//! cargo test -p fleet-tests exploits::
//!
//! # Benchmarks
//! cargo bench -p fleet-tests
//! ```

#![allow(dead_code)]

pub mod benchmarks;
pub mod exploits;
pub mod fleet;
pub mod integration;
