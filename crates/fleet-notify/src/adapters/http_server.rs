//! Notification HTTP API.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /notify` | Receive a sealed notification |
//! | `GET /notify/read/{token}` | One-time origin-gated payload read |
//! | `GET /metrics` | Prometheus exposition |
//! | `GET /health` | Liveness |
//!
//! Rejections are `403`, unknown read tokens `404`, everything else that
//! goes wrong inside the node `500`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleet_telemetry::log_event;
use fleet_telemetry::metrics::RECEIVE_REJECTIONS;
use serde_json::json;
use shared_crypto::Envelope;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::domain::NotifyError;
use crate::ports::{InboundRequest, NotificationInbound};
use crate::service::StorageGate;

/// Default cap on a `POST /notify` body.
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Shared state of the notification routes.
#[derive(Clone)]
pub struct HttpState {
    pub inbound: Arc<dyn NotificationInbound>,
    pub storage: Arc<StorageGate>,
}

/// Build the router. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so handlers see
/// the peer address.
pub fn router(state: HttpState, body_limit: usize) -> Router {
    Router::new()
        .route("/notify", post(receive_notification))
        .route("/notify/read/:token", get(read_storage))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, reason: &str, message: String) -> Response {
    (status, Json(json!({ "error": reason, "message": message }))).into_response()
}

fn notify_error_response(err: &NotifyError) -> Response {
    match err {
        NotifyError::Forbidden(rejection) => {
            error_response(StatusCode::FORBIDDEN, rejection.reason(), err.to_string())
        }
        NotifyError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        other => {
            log_event!(error, "http", "Request failed", error = %other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.outcome(), other.to_string())
        }
    }
}

async fn receive_notification(
    State(state): State<HttpState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            log_event!(warn, "http", "Unreadable envelope", origin = %peer.ip(), error = %e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "malformed_envelope",
                e.to_string(),
            );
        }
    };

    let request = match InboundRequest::from_headers(envelope, peer.ip(), |name| {
        headers.get(name).and_then(|v| v.to_str().ok())
    }) {
        Ok(request) => request,
        Err(rejection) => {
            RECEIVE_REJECTIONS.with_label_values(&[rejection.reason()]).inc();
            log_event!(
                warn,
                "http",
                "Rejected notification headers",
                origin = %peer.ip(),
                reason = rejection.reason()
            );
            return notify_error_response(&rejection.into());
        }
    };

    match state.inbound.receive(request).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => notify_error_response(&e),
    }
}

async fn read_storage(
    State(state): State<HttpState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(token): Path<String>,
) -> Response {
    match state.storage.read(&token, peer.ip()).await {
        Ok(data) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            data,
        )
            .into_response(),
        Err(e) => notify_error_response(&e),
    }
}

async fn metrics() -> Response {
    match fleet_telemetry::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics", e.to_string()),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}
