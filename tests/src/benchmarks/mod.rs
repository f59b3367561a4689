//! # Fleet Benchmarks
//!
//! Hot paths of every delivery: sealing and opening envelopes, and the
//! receive path with key discovery.

pub mod envelope;
pub mod receive;
