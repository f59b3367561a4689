//! Node lifecycle: background tasks, HTTP serving and graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::NodeConfig;
use crate::container::{ContainerError, NodeContainer};

/// How long background tasks get to finish after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A running fleet node.
pub struct NodeRuntime {
    container: Arc<NodeContainer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    pub async fn new(config: NodeConfig) -> Result<Self, ContainerError> {
        let container = Arc::new(NodeContainer::build(config).await?);
        Ok(Self::from_container(container))
    }

    pub fn from_container(container: Arc<NodeContainer>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn container(&self) -> Arc<NodeContainer> {
        Arc::clone(&self.container)
    }

    /// Serve on `listener` until `signal` resolves, then stop background
    /// tasks.
    pub async fn serve<F>(&self, listener: TcpListener, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tasks = self.container.stack.start(self.shutdown_rx.clone());
        let node = &self.container.node;
        info!(
            node_id = %node.id,
            fqdn = %node.fqdn,
            bind = %listener.local_addr()?,
            "Fleet node serving"
        );

        let app = self
            .container
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await;
        if let Err(e) = &served {
            error!(error = %e, "HTTP server error");
        }

        self.shutdown(tasks).await;
        served
    }

    /// Signal background tasks and wait for them, bounded by a grace period.
    pub async fn shutdown(&self, tasks: Vec<JoinHandle<()>>) {
        info!("Initiating graceful shutdown...");
        if self.shutdown_tx.send(true).is_err() {
            warn!("No background task was listening for shutdown");
        }
        let joined = tokio::time::timeout(SHUTDOWN_GRACE, join_tasks(tasks)).await;
        if joined.is_err() {
            warn!(grace = ?SHUTDOWN_GRACE, "Background tasks did not stop in time");
        }
        info!("Shutdown complete");
    }
}

async fn join_tasks(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }
}
