//! Service wiring.
//!
//! Builds every service of one node from its outbound ports in dependency
//! order, so no service holds a reference back to its owner:
//!
//! ```text
//! SyncRegistry, InboxHandle
//!   -> KeyRing, KeyDiscovery
//!   -> NotificationReceiver (InboxHandle)
//!   -> NotificationSender (NotificationReceiver)
//!   -> SyncRpcEmulator (NotificationSender, SyncRegistry)
//!   -> InboxProcessor (NotificationSender as ReplySender, SyncRegistry)
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shared_types::Node;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::{LocalAddresses, NotifyConfig, SentNotification};
use crate::ports::{
    HandlerRegistry, InboxRepository, NetworkStateProvider, Repository, RestoreAuthority,
    StorageStream, TimeSource, Transport, TrustStore,
};
use crate::service::{
    InboxHandle, InboxProcessor, InboxQueue, KeyDiscovery, KeyRing, NotificationReceiver,
    NotificationSender, StorageGate, SyncRegistry, SyncRpcEmulator,
};

/// External collaborators of one node.
#[derive(Clone)]
pub struct StackPorts {
    pub trust: Arc<dyn TrustStore>,
    pub nodes: Arc<dyn Repository<Node>>,
    pub sent: Arc<dyn Repository<SentNotification>>,
    pub inbox: Arc<dyn InboxRepository>,
    pub transport: Arc<dyn Transport>,
    pub restore: Arc<dyn RestoreAuthority>,
    pub networks: Arc<dyn NetworkStateProvider>,
    pub storage: Arc<dyn StorageStream>,
    pub handlers: Arc<dyn HandlerRegistry>,
    pub time: Arc<dyn TimeSource>,
}

/// All services of one node.
pub struct NotifyStack {
    pub keys: Arc<KeyRing>,
    pub discovery: Arc<KeyDiscovery>,
    pub receiver: Arc<NotificationReceiver>,
    pub sender: Arc<NotificationSender>,
    pub sync: Arc<SyncRegistry>,
    pub rpc: Arc<SyncRpcEmulator>,
    pub inbox: Arc<InboxProcessor>,
    pub storage: Arc<StorageGate>,
    config: NotifyConfig,
    queue: Mutex<Option<InboxQueue>>,
}

impl NotifyStack {
    /// Wire a node. `local` is extended with the node's own addresses.
    pub fn build(node: Node, local: LocalAddresses, config: NotifyConfig, ports: StackPorts) -> Self {
        let local = LocalAddresses::new(
            local
                .iter()
                .copied()
                .chain(node.ip4.map(Into::into))
                .chain(node.ip6.map(Into::into))
                .collect::<Vec<_>>(),
        );

        let sync = Arc::new(SyncRegistry::new(&config.sync));
        let (handle, queue) = InboxHandle::channel(config.inbox.queue_depth);

        let keys = Arc::new(KeyRing::new(
            node,
            Arc::clone(&ports.trust),
            Arc::clone(&ports.time),
            config.keys.clone(),
        ));
        let discovery = Arc::new(KeyDiscovery::new(
            Arc::clone(&ports.trust),
            ports.restore,
            ports.networks,
            Arc::clone(&ports.time),
            local.clone(),
            config.keys.clone(),
        ));
        let receiver = Arc::new(NotificationReceiver::new(
            Arc::clone(&keys),
            Arc::clone(&discovery),
            Arc::clone(&ports.nodes),
            Arc::clone(&ports.inbox),
            handle.clone(),
            Arc::clone(&ports.time),
            config.require_same_fleet,
        ));
        let sender = Arc::new(NotificationSender::new(
            Arc::clone(&keys),
            ports.trust,
            Arc::clone(&ports.nodes),
            ports.sent,
            ports.transport,
            Arc::clone(&receiver),
            Arc::clone(&ports.time),
            config.local_delivery,
        ));
        let rpc = Arc::new(SyncRpcEmulator::new(
            Arc::clone(&sender),
            Arc::clone(&sync),
            Arc::clone(&ports.time),
            config.sync.clone(),
        ));
        let inbox = Arc::new(InboxProcessor::new(
            ports.inbox,
            ports.handlers,
            sender.clone(),
            Arc::clone(&sync),
            ports.time,
            handle,
            config.inbox.clone(),
        ));
        let storage = Arc::new(StorageGate::new(ports.storage, ports.nodes, local));

        Self {
            keys,
            discovery,
            receiver,
            sender,
            sync,
            rpc,
            inbox,
            storage,
            config,
            queue: Mutex::new(Some(queue)),
        }
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Take the inbox queue to drive it by hand. `start` will not run the
    /// dispatcher afterwards.
    pub fn take_queue(&self) -> Option<InboxQueue> {
        self.queue.lock().take()
    }

    /// Start the inbox dispatcher, the inbox sweep and the sync table purge.
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(queue) = self.take_queue() {
            tasks.push(tokio::spawn(
                Arc::clone(&self.inbox).run(queue, shutdown.clone()),
            ));
        }
        tasks.push(Arc::clone(&self.inbox).spawn_sweep(shutdown.clone()));
        let purge_every = self.config.sync.in_flight_ttl.max(Duration::from_secs(1));
        tasks.push(Arc::clone(&self.sync).spawn_purge(purge_every, shutdown));
        tasks
    }
}
