//! Prometheus metrics for the notification protocol.
//!
//! All metrics follow the naming convention: `fleet_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DELIVERY
    // =========================================================================

    /// Outbound notifications by strategy and outcome
    pub static ref NOTIFICATIONS_SENT: CounterVec = CounterVec::new(
        Opts::new("fleet_sender_notifications_total", "Outbound notifications"),
        &["strategy", "outcome"]  // strategy: inline/loopback/remote, outcome: sent/transient/forbidden/error
    ).expect("metric creation failed");

    /// Remote delivery latency
    pub static ref DELIVERY_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "fleet_sender_delivery_duration_seconds",
            "Time spent posting an envelope to a remote node"
        ).buckets(exponential_buckets(0.005, 2.0, 12).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Inbound notifications accepted and persisted
    pub static ref NOTIFICATIONS_RECEIVED: Counter = Counter::new(
        "fleet_receiver_notifications_total",
        "Inbound notifications accepted"
    ).expect("metric creation failed");

    /// Inbound notifications refused, by reason
    pub static ref RECEIVE_REJECTIONS: CounterVec = CounterVec::new(
        Opts::new("fleet_receiver_rejections_total", "Inbound notifications rejected"),
        &["reason"]
    ).expect("metric creation failed");

    // =========================================================================
    // KEY DISCOVERY
    // =========================================================================

    /// Key discovery decisions by path
    pub static ref KEY_DECISIONS: CounterVec = CounterVec::new(
        Opts::new("fleet_keys_decisions_total", "Key discovery outcomes"),
        &["path"]  // known_key, local_alias, same_material, bootstrap, rotation_grace, restore, rejected
    ).expect("metric creation failed");

    // =========================================================================
    // SYNC RPC
    // =========================================================================

    /// Sync calls by role
    pub static ref SYNC_CALLS: CounterVec = CounterVec::new(
        Opts::new("fleet_sync_calls_total", "Synchronous calls issued"),
        &["role"]  // leader/follower
    ).expect("metric creation failed");

    /// Sync call outcomes
    pub static ref SYNC_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("fleet_sync_outcomes_total", "Synchronous call outcomes"),
        &["outcome"]  // response/remote_error/timeout/send_error
    ).expect("metric creation failed");

    /// Time callers spent waiting for a reply
    pub static ref SYNC_WAIT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "fleet_sync_wait_duration_seconds",
            "Time spent waiting for a synchronous reply"
        ).buckets(exponential_buckets(0.01, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // INBOX
    // =========================================================================

    /// Inbox dispatch outcomes
    pub static ref INBOX_PROCESSED: CounterVec = CounterVec::new(
        Opts::new("fleet_inbox_processed_total", "Inbox messages processed"),
        &["outcome"]  // completed/error/reply/unmatched_reply
    ).expect("metric creation failed");

    /// Messages queued for a worker
    pub static ref INBOX_QUEUED: Gauge = Gauge::new(
        "fleet_inbox_queued",
        "Messages waiting for an inbox worker"
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Delivery
        Box::new(NOTIFICATIONS_SENT.clone()),
        Box::new(DELIVERY_DURATION.clone()),
        Box::new(NOTIFICATIONS_RECEIVED.clone()),
        Box::new(RECEIVE_REJECTIONS.clone()),
        // Keys
        Box::new(KEY_DECISIONS.clone()),
        // Sync
        Box::new(SYNC_CALLS.clone()),
        Box::new(SYNC_OUTCOMES.clone()),
        Box::new(SYNC_WAIT_DURATION.clone()),
        // Inbox
        Box::new(INBOX_PROCESSED.clone()),
        Box::new(INBOX_QUEUED.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
