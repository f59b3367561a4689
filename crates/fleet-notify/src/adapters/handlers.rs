//! Built-in notification handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::NodeId;

use crate::domain::HandlerError;
use crate::ports::{HandlerContext, NotificationHandler, TimeSource};

/// Body of a `health_check_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub node_id: NodeId,
    pub status: String,
    /// Responder's clock, milliseconds since the epoch.
    pub time: u64,
    pub version: String,
}

/// Answers `health_check` with this node's status.
pub struct HealthCheckHandler {
    node_id: NodeId,
    time: Arc<dyn TimeSource>,
}

impl HealthCheckHandler {
    pub fn new(node_id: NodeId, time: Arc<dyn TimeSource>) -> Self {
        Self { node_id, time }
    }
}

#[async_trait]
impl NotificationHandler for HealthCheckHandler {
    async fn handle(&self, ctx: &HandlerContext) -> Result<(), HandlerError> {
        let status = HealthStatus {
            node_id: self.node_id,
            status: "ok".to_string(),
            time: self.time.now().as_millis(),
            version: crate::VERSION.to_string(),
        };
        ctx.respond(serde_json::to_value(status)?).await
    }
}
