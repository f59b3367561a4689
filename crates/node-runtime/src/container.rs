//! # Node Container
//!
//! Builds the notification stack of one node on in-memory stores and the
//! HTTP transport, seeds configured peers and exposes the router.

use std::sync::Arc;

use axum::Router;
use fleet_notify::adapters::{
    router, HealthCheckHandler, HttpState, HttpTransport, InMemoryNetworkStates,
    InMemoryRepository, InMemoryStorageStream, InMemoryTrustStore, StaticHandlerRegistry,
    StaticRestoreAuthority,
};
use fleet_notify::domain::{NodeKey, ReceivedNotification, SentNotification};
use fleet_notify::{
    LocalAddresses, NotifyError, NotifyStack, Repository, StackPorts, SystemTimeSource, TimeSource,
    TransportError, TrustStore,
};
use shared_types::{NetworkState, NetworkStatus, Node, NotificationType};
use thiserror::Error;
use tracing::info;

use crate::config::{NodeConfig, NodeConfigError};

/// Startup failures.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Config(#[from] NodeConfigError),

    #[error("cannot build HTTP client: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("peer {0} has no address")]
    PeerWithoutAddress(shared_types::NodeId),
}

/// Everything one running node owns.
pub struct NodeContainer {
    pub node: Node,
    pub config: NodeConfig,
    pub stack: Arc<NotifyStack>,
    pub trust: Arc<InMemoryTrustStore>,
    pub nodes: Arc<InMemoryRepository<Node>>,
    pub restore: Arc<StaticRestoreAuthority>,
    pub networks: Arc<InMemoryNetworkStates>,
}

impl NodeContainer {
    /// Wire the node and seed configured peers.
    pub async fn build(config: NodeConfig) -> Result<Self, ContainerError> {
        let transport = HttpTransport::new(config.http.connect_timeout, config.http.request_timeout)?;
        Self::build_with(config, Arc::new(transport)).await
    }

    /// Wire the node with a custom transport.
    pub async fn build_with(
        config: NodeConfig,
        transport: Arc<dyn fleet_notify::Transport>,
    ) -> Result<Self, ContainerError> {
        let node = config.identity.node();
        let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);

        let trust = Arc::new(InMemoryTrustStore::new());
        let nodes = Arc::new(InMemoryRepository::<Node>::new());
        let restore = Arc::new(StaticRestoreAuthority::new(config.restore_tokens.iter().cloned()));
        let networks = Arc::new(InMemoryNetworkStates::new());
        let handlers = StaticHandlerRegistry::new().with(
            NotificationType::HealthCheck,
            Arc::new(HealthCheckHandler::new(node.id, Arc::clone(&time))),
        );

        let stack = NotifyStack::build(
            node.clone(),
            LocalAddresses::new(config.local_addresses.iter().copied()),
            config.notify.clone(),
            StackPorts {
                trust: trust.clone(),
                nodes: nodes.clone(),
                sent: Arc::new(InMemoryRepository::<SentNotification>::new()),
                inbox: Arc::new(InMemoryRepository::<ReceivedNotification>::new()),
                transport,
                restore: restore.clone(),
                networks: networks.clone(),
                storage: Arc::new(InMemoryStorageStream::new(Arc::clone(&time))),
                handlers: Arc::new(handlers),
                time: Arc::clone(&time),
            },
        );
        stack.sender.set_restore_key(config.identity.restore_key.clone());

        nodes.create(node.clone()).await.map_err(NotifyError::from)?;
        let key = match config.identity.fixed_key()? {
            Some((key_id, pair)) => stack.keys.import(key_id, pair).await?,
            None => stack.keys.current().await?,
        };
        info!(
            node_id = %node.id,
            key_id = %key.key_id(),
            public_key = %key.record.public_key.to_hex(),
            "Node key ready"
        );

        let container = Self {
            node,
            config,
            stack: Arc::new(stack),
            trust,
            nodes,
            restore,
            networks,
        };
        container.seed(time.as_ref()).await?;
        Ok(container)
    }

    async fn seed(&self, time: &dyn TimeSource) -> Result<(), ContainerError> {
        let now = time.now();
        for peer in &self.config.peers {
            let node = peer.node();
            self.nodes.create(node.clone()).await.map_err(NotifyError::from)?;
            if let Some((key_id, public_key)) = peer.trusted_key()? {
                let origin = node
                    .primary_ip()
                    .ok_or(ContainerError::PeerWithoutAddress(node.id))?;
                self.trust
                    .create(NodeKey::new(
                        key_id,
                        node.id,
                        public_key,
                        origin,
                        now,
                        self.config.notify.keys.key_lifetime(),
                    ))
                    .await
                    .map_err(NotifyError::from)?;
            }
        }
        for network in &self.config.restoring_networks {
            self.networks.set(NetworkState {
                network: *network,
                status: NetworkStatus::Restoring,
                since: now,
            });
        }
        info!(
            peers = self.config.peers.len(),
            trusted_keys = self.trust.len(),
            restoring_networks = self.config.restoring_networks.len(),
            "Seeded node registry"
        );
        Ok(())
    }

    /// The notification API.
    pub fn router(&self) -> Router {
        router(
            HttpState {
                inbound: self.stack.receiver.clone(),
                storage: Arc::clone(&self.stack.storage),
            },
            self.config.http.body_limit,
        )
    }
}
