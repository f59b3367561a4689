//! # Receive Path Benchmarks
//!
//! A delivery from a known key is the steady state; first contact adds a
//! trust record under the striped lock.

use criterion::{BatchSize, Criterion};
use fleet_notify::service::KeyClaim;
use fleet_notify::test_utils::{fleet_node, TestNode};
use shared_crypto::NodeKeyPair;
use shared_types::KeyId;
use tokio::runtime::Runtime;

use crate::exploits::Forgery;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("benchmark runtime")
}

pub fn bench_known_key_receive(c: &mut Criterion) {
    let rt = runtime();
    let (node, request) = rt.block_on(async {
        let node = TestNode::builder("10.0.0.1").build().await;
        let _queue = node.take_queue();
        let peer = fleet_node("10.0.0.2", &node.node);
        node.knows(&peer).await;
        let forgery = Forgery::new(&peer, "10.0.0.2");
        let first = forgery.request(&node).await;
        node.stack.receiver.receive(first).await.expect("bootstrap");
        let request = forgery.request(&node).await;
        (node, request)
    });

    c.bench_function("receive-known-key", |b| {
        b.to_async(&rt).iter(|| {
            let request = request.clone();
            let receiver = node.stack.receiver.clone();
            async move { receiver.receive(request).await.expect("receive") }
        })
    });
}

pub fn bench_first_contact_discovery(c: &mut Criterion) {
    let rt = runtime();
    let node = rt.block_on(TestNode::builder("10.0.0.1").build());

    c.bench_function("discover-first-contact", |b| {
        b.to_async(&rt).iter_batched(
            || KeyClaim {
                from_node: fleet_node("10.0.0.2", &node.node),
                key_id: KeyId::new_random(),
                origin: "10.0.0.2".parse().expect("origin"),
                restore_token: None,
                public_key: NodeKeyPair::generate().public(),
            },
            |claim| {
                let discovery = node.stack.discovery.clone();
                async move { discovery.discover(&claim).await.expect("bootstrap") }
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_known_key_receive(c);
    bench_first_contact_discovery(c);
}
