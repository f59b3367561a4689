//! # Fleet Notification Benchmarks
//!
//! | Path | Runs per delivery |
//! |------|-------------------|
//! | Envelope seal | once on the sender |
//! | Envelope open | once on the receiver |
//! | Receive with known key | steady state on the receiver |
//! | First contact discovery | once per new peer key |

use criterion::{criterion_group, criterion_main, Criterion};
use fleet_tests::benchmarks::{envelope, receive};

fn envelope_benchmarks(c: &mut Criterion) {
    envelope::register_benchmarks(c);
}

fn receive_benchmarks(c: &mut Criterion) {
    receive::register_benchmarks(c);
}

criterion_group!(benches, envelope_benchmarks, receive_benchmarks);
criterion_main!(benches);
