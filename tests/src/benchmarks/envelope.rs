//! # Envelope Benchmarks
//!
//! Every remote delivery seals once on the sender and opens once on the
//! receiver. Payloads range from a health check to a storage driver chunk.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use rand::RngCore;
use shared_crypto::{open, seal, NodeKeyPair};
use std::time::Duration;

const PAYLOAD_SIZES: &[usize] = &[64, 1024, 64 * 1024, 1024 * 1024];

fn payload(size: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

pub fn bench_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope-seal");
    group.measurement_time(Duration::from_secs(5));
    let sender = NodeKeyPair::generate();
    let recipient = NodeKeyPair::generate().public();

    for &size in PAYLOAD_SIZES {
        let plaintext = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &plaintext, |b, plaintext| {
            b.iter(|| seal(black_box(plaintext), &sender, &recipient).expect("seal"))
        });
    }
    group.finish();
}

pub fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope-open");
    group.measurement_time(Duration::from_secs(5));
    let sender = NodeKeyPair::generate();
    let recipient = NodeKeyPair::generate();

    for &size in PAYLOAD_SIZES {
        let envelope = seal(&payload(size), &sender, &recipient.public()).expect("seal");
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &envelope, |b, envelope| {
            b.iter(|| open(black_box(envelope), &recipient, &sender.public()).expect("open"))
        });
    }
    group.finish();
}

/// Opening with the wrong sender key must fail as fast as a match.
pub fn bench_open_rejected(c: &mut Criterion) {
    let sender = NodeKeyPair::generate();
    let recipient = NodeKeyPair::generate();
    let impostor = NodeKeyPair::generate().public();
    let envelope = seal(&payload(1024), &sender, &recipient.public()).expect("seal");

    c.bench_function("envelope-open-sender-mismatch", |b| {
        b.iter(|| open(black_box(&envelope), &recipient, &impostor).is_err())
    });
}

pub fn bench_key_generation(c: &mut Criterion) {
    c.bench_function("node-key-generate", |b| b.iter(NodeKeyPair::generate));
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_seal(c);
    bench_open(c);
    bench_open_rejected(c);
    bench_key_generation(c);
}
