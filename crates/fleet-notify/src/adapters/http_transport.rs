//! `Transport` over HTTP using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use shared_crypto::Envelope;
use shared_types::NotificationReceipt;

use crate::domain::TransportError;
use crate::ports::{DeliveryHeaders, Transport};

/// Posts envelopes to `POST /notify` on remote nodes.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Client with connect and overall request timeouts.
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(concat!("fleet-node/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Transient(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Connect, timeout and resolution failures may be retried; everything
/// else is reported as-is.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        TransportError::Transient(err.to_string())
    } else {
        TransportError::Remote {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            body: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        uri: &str,
        headers: &DeliveryHeaders,
        envelope: &Envelope,
    ) -> Result<NotificationReceipt, TransportError> {
        let mut request = self.client.post(uri).json(envelope);
        for (name, value) in headers.to_pairs() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(TransportError::Forbidden);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(classify)?;
        if body.is_empty() {
            return Ok(NotificationReceipt::default());
        }
        serde_json::from_slice(&body).map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}
