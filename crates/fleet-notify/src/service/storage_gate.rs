//! Origin-gated one-time reads of registered payloads.

use std::net::IpAddr;
use std::sync::Arc;

use fleet_telemetry::log_event;
use shared_types::Node;

use crate::domain::{LocalAddresses, NotifyError, Rejection};
use crate::ports::{Repository, StorageStream};

/// Serves `GET /notify/read/{token}`.
pub struct StorageGate {
    stream: Arc<dyn StorageStream>,
    nodes: Arc<dyn Repository<Node>>,
    local: LocalAddresses,
}

impl StorageGate {
    pub fn new(
        stream: Arc<dyn StorageStream>,
        nodes: Arc<dyn Repository<Node>>,
        local: LocalAddresses,
    ) -> Self {
        Self {
            stream,
            nodes,
            local,
        }
    }

    /// Register a payload for `from_node` to fetch once.
    pub async fn register(&self, from_node: &Node, data: Vec<u8>) -> Result<String, NotifyError> {
        Ok(self.stream.register(from_node.id, data).await?)
    }

    /// Fetch the bytes behind `token` and invalidate it.
    ///
    /// Unknown tokens and unknown nodes are `NotFound`. The reader must pass
    /// the same origin check as message receipt against one of the node's
    /// addresses, so loopback only reads tokens of nodes hosted here.
    pub async fn read(&self, token: &str, origin: IpAddr) -> Result<Vec<u8>, NotifyError> {
        let ticket = self
            .stream
            .find_read(token)
            .await?
            .ok_or_else(|| NotifyError::NotFound(format!("read token {token}")))?;
        let node = self
            .nodes
            .find(&ticket.from_node)
            .await?
            .ok_or_else(|| NotifyError::NotFound(format!("node {}", ticket.from_node)))?;

        if !self.origin_matches(&node, origin) {
            log_event!(
                warn,
                "storage_gate",
                "Read from unexpected origin",
                node_id = %node.id,
                origin = %origin
            );
            return Err(Rejection::ReaderOriginMismatch {
                node_id: node.id,
                observed: origin,
            }
            .into());
        }

        let data = self
            .stream
            .read(&ticket)
            .await?
            .ok_or_else(|| NotifyError::NotFound(format!("read token {token}")))?;
        self.stream.clear_token(token).await?;
        Ok(data)
    }

    fn origin_matches(&self, node: &Node, origin: IpAddr) -> bool {
        node.ip4
            .map(IpAddr::V4)
            .into_iter()
            .chain(node.ip6.map(IpAddr::V6))
            .any(|addr| self.local.check(addr, origin).is_match())
    }
}
