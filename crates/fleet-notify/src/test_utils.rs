//! Test utilities for fleet notifications.
//!
//! Deterministic clocks, scripted transports and fully wired in-memory
//! nodes. Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleet_notify::test_utils::MockTimeSource;
//! use fleet_notify::TimeSource;
//! use std::time::Duration;
//!
//! let time = MockTimeSource::new(1_000);
//! time.advance(Duration::from_secs(1));
//! assert_eq!(time.now().as_millis(), 2_000);
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_crypto::{open, Envelope, NodeKeyPair};
use shared_types::{
    AccountId, DomainId, KeyId, NetworkId, Node, NodeId, NotificationId, NotificationMessage,
    NotificationReceipt, SyncReply, Timestamp,
};

use crate::adapters::memory::{
    InMemoryNetworkStates, InMemoryRepository, InMemoryStorageStream, InMemoryTrustStore,
    StaticRestoreAuthority,
};
use crate::adapters::registry::StaticHandlerRegistry;
use crate::domain::{
    HandlerError, KeyConfig, LocalAddresses, LocalDelivery, NodeKey, NotifyConfig, NotifyError,
    ReceivedNotification, SentNotification, SyncConfig, TransportError,
};
use crate::ports::{
    DeliveryHeaders, HandlerContext, HandlerRegistry, InboundRequest, NotificationHandler,
    NotificationInbound, ReplySender, Repository, TimeSource, Transport, TrustStore,
};
use crate::service::{InboxQueue, SyncRegistry, SyncRpcEmulator};
use crate::stack::{NotifyStack, StackPorts};

/// A node with its own random network, domain and account.
///
/// `ip` may be IPv4 or IPv6. Panics on an unparsable address.
pub fn test_node(ip: &str) -> Node {
    let addr: IpAddr = ip.parse().expect("test node address");
    let (ip4, ip6) = match addr {
        IpAddr::V4(v4) => (Some(v4), None),
        IpAddr::V6(v6) => (None, Some(v6)),
    };
    Node {
        id: NodeId::new_random(),
        network: NetworkId::new_random(),
        domain: DomainId::new_random(),
        account: AccountId::new_random(),
        fqdn: ip.to_string(),
        ip4,
        ip6,
        admin_port: 8443,
        tls: false,
    }
}

/// A node in the same network, domain and account as `fleet`.
pub fn fleet_node(ip: &str, fleet: &Node) -> Node {
    Node {
        network: fleet.network,
        domain: fleet.domain,
        account: fleet.account,
        ..test_node(ip)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    millis: AtomicU64,
    offset_ms: AtomicI64,
}

impl MockTimeSource {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
            offset_ms: AtomicI64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Pretend the clock has been deliberately shifted.
    pub fn set_offset_ms(&self, offset: i64) {
        self.offset_ms.store(offset, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::SeqCst))
    }

    fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::SeqCst)
    }
}

/// Counts invocations and succeeds.
#[derive(Debug, Default)]
pub struct CountingHandler {
    calls: AtomicUsize,
}

impl CountingHandler {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationHandler for CountingHandler {
    async fn handle(&self, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Always fails.
#[derive(Debug, Default)]
pub struct FailingHandler;

#[async_trait]
impl NotificationHandler for FailingHandler {
    async fn handle(&self, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        Err(HandlerError::Failed("handler exploded".to_string()))
    }
}

/// Keeps every reply instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingReplies {
    replies: Mutex<Vec<SyncReply>>,
}

impl RecordingReplies {
    pub fn replies(&self) -> Vec<SyncReply> {
        self.replies.lock().clone()
    }
}

#[async_trait]
impl ReplySender for RecordingReplies {
    async fn reply(
        &self,
        _request: &ReceivedNotification,
        reply: SyncReply,
    ) -> Result<NotificationReceipt, NotifyError> {
        self.replies.lock().push(reply);
        Ok(NotificationReceipt::default())
    }
}

/// How `MockTransport` answers the next posts.
#[derive(Clone)]
pub enum ScriptedReply {
    /// Default receipt.
    Ok,
    /// Connection-level failure.
    Transient,
    /// Recipient refused the sender.
    Forbidden,
    /// Accept, and resolve the caller's sync waiter with this response.
    AutoReply(Value, Arc<SyncRegistry>),
}

struct Posted {
    headers: DeliveryHeaders,
    message: Option<NotificationMessage>,
}

/// Records posts and answers per script.
///
/// Holds the recipient key pair so it can read what was sent.
pub struct MockTransport {
    recipient: NodeKeyPair,
    script: Mutex<ScriptedReply>,
    posted: Mutex<Vec<Posted>>,
    latency: Mutex<Duration>,
}

impl MockTransport {
    pub fn new(recipient: NodeKeyPair) -> Self {
        Self {
            recipient,
            script: Mutex::new(ScriptedReply::Ok),
            posted: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Delay every following post by `latency` before it is recorded.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Answer every following post with `reply`.
    pub fn script(&self, reply: ScriptedReply) {
        *self.script.lock() = reply;
    }

    pub fn calls(&self) -> usize {
        self.posted.lock().len()
    }

    pub fn last_headers(&self) -> Option<DeliveryHeaders> {
        self.posted.lock().last().map(|p| p.headers.clone())
    }

    pub fn last_notification_id(&self) -> Option<NotificationId> {
        self.posted
            .lock()
            .last()
            .and_then(|p| p.message.as_ref().map(|m| m.id))
    }

    pub fn notification_ids(&self) -> Vec<NotificationId> {
        self.posted
            .lock()
            .iter()
            .filter_map(|p| p.message.as_ref().map(|m| m.id))
            .collect()
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.posted
            .lock()
            .iter()
            .filter_map(|p| p.message.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(
        &self,
        _uri: &str,
        headers: &DeliveryHeaders,
        envelope: &Envelope,
    ) -> Result<NotificationReceipt, TransportError> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let message = open(envelope, &self.recipient, &envelope.public_key)
            .ok()
            .and_then(|plain| serde_json::from_slice::<NotificationMessage>(&plain).ok());
        let id = message.as_ref().map(|m| m.id);
        self.posted.lock().push(Posted {
            headers: headers.clone(),
            message,
        });

        let script = self.script.lock().clone();
        match script {
            ScriptedReply::Ok => Ok(NotificationReceipt::default()),
            ScriptedReply::Transient => Err(TransportError::Transient("connection refused".into())),
            ScriptedReply::Forbidden => Err(TransportError::Forbidden),
            ScriptedReply::AutoReply(response, registry) => {
                if let Some(id) = id {
                    registry.complete(SyncReply::ok(id, response));
                }
                Ok(NotificationReceipt::default())
            }
        }
    }
}

/// Notify endpoints reachable in this process, keyed by notify URI.
#[derive(Clone, Default)]
pub struct InProcessNetwork {
    routes: Arc<RwLock<HashMap<String, Arc<dyn NotificationInbound>>>>,
}

impl InProcessNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, uri: impl Into<String>, inbound: Arc<dyn NotificationInbound>) {
        self.routes.write().insert(uri.into(), inbound);
    }

    pub fn detach(&self, uri: &str) {
        self.routes.write().remove(uri);
    }

    /// A transport whose deliveries appear to come from `origin`.
    pub fn transport(&self, origin: IpAddr) -> Arc<InProcessTransport> {
        Arc::new(InProcessTransport {
            network: self.clone(),
            origin: RwLock::new(origin),
        })
    }
}

/// Delivers straight into another node's receiver, as the HTTP adapter would.
pub struct InProcessTransport {
    network: InProcessNetwork,
    origin: RwLock<IpAddr>,
}

impl InProcessTransport {
    /// Change the source address of following deliveries.
    pub fn set_origin(&self, origin: IpAddr) {
        *self.origin.write() = origin;
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn post(
        &self,
        uri: &str,
        headers: &DeliveryHeaders,
        envelope: &Envelope,
    ) -> Result<NotificationReceipt, TransportError> {
        let inbound = self
            .network
            .routes
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| TransportError::Transient(format!("no route to {uri}")))?;

        let request = InboundRequest {
            envelope: envelope.clone(),
            from_node: headers.from_node,
            from_key: headers.from_key,
            to_key: headers.to_key,
            origin: *self.origin.read(),
            restore_key: headers.restore_key.clone(),
        };
        match inbound.receive(request).await {
            Ok(receipt) => Ok(receipt),
            Err(e) if e.is_forbidden() => Err(TransportError::Forbidden),
            Err(e) => Err(TransportError::Remote {
                status: 500,
                body: e.to_string(),
            }),
        }
    }
}

/// A fully wired node on in-memory adapters.
pub struct TestNode {
    pub node: Node,
    pub time: Arc<MockTimeSource>,
    pub trust: Arc<InMemoryTrustStore>,
    pub nodes: Arc<InMemoryRepository<Node>>,
    pub sent: Arc<InMemoryRepository<SentNotification>>,
    pub inbox: Arc<InMemoryRepository<ReceivedNotification>>,
    pub restore: Arc<StaticRestoreAuthority>,
    pub networks: Arc<InMemoryNetworkStates>,
    pub storage: Arc<InMemoryStorageStream>,
    pub stack: NotifyStack,
}

impl TestNode {
    pub fn builder(ip: &str) -> TestNodeBuilder {
        TestNodeBuilder {
            node: test_node(ip),
            config: NotifyConfig::default(),
            transport: None,
            handlers: None,
            time: None,
        }
    }

    /// Take the inbox queue. Panics if it was already taken.
    pub fn take_queue(&self) -> InboxQueue {
        self.stack.take_queue().expect("inbox queue already taken")
    }

    /// Register `other` in this node's registry.
    pub async fn knows(&self, other: &Node) {
        self.nodes.create(other.clone()).await.expect("register node");
    }
}

pub struct TestNodeBuilder {
    node: Node,
    config: NotifyConfig,
    transport: Option<Arc<dyn Transport>>,
    handlers: Option<Arc<dyn HandlerRegistry>>,
    time: Option<Arc<MockTimeSource>>,
}

impl TestNodeBuilder {
    /// Use `node` as identity instead of a random one.
    pub fn node(mut self, node: Node) -> Self {
        self.node = node;
        self
    }

    pub fn local_delivery(mut self, local_delivery: LocalDelivery) -> Self {
        self.config.local_delivery = local_delivery;
        self
    }

    pub fn config(mut self, config: NotifyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn handlers(mut self, handlers: Arc<dyn HandlerRegistry>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn time(mut self, time: Arc<MockTimeSource>) -> Self {
        self.time = Some(time);
        self
    }

    /// Wire the node, register it with itself and generate its first key.
    pub async fn build(self) -> TestNode {
        let time = self
            .time
            .unwrap_or_else(|| Arc::new(MockTimeSource::new(1_700_000_000_000)));
        let trust = Arc::new(InMemoryTrustStore::new());
        let nodes = Arc::new(InMemoryRepository::<Node>::new());
        let sent = Arc::new(InMemoryRepository::<SentNotification>::new());
        let inbox = Arc::new(InMemoryRepository::<ReceivedNotification>::new());
        let restore = Arc::new(StaticRestoreAuthority::default());
        let networks = Arc::new(InMemoryNetworkStates::new());
        let storage = Arc::new(InMemoryStorageStream::new(time.clone()));
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let origin = self.node.primary_ip().unwrap_or(IpAddr::from([127, 0, 0, 1]));
                InProcessNetwork::new().transport(origin)
            }
        };
        let handlers: Arc<dyn HandlerRegistry> = match self.handlers {
            Some(handlers) => handlers,
            None => Arc::new(StaticHandlerRegistry::new()),
        };

        let stack = NotifyStack::build(
            self.node.clone(),
            LocalAddresses::new([]),
            self.config,
            StackPorts {
                trust: trust.clone(),
                nodes: nodes.clone(),
                sent: sent.clone(),
                inbox: inbox.clone(),
                transport,
                restore: restore.clone(),
                networks: networks.clone(),
                storage: storage.clone(),
                handlers,
                time: time.clone(),
            },
        );
        nodes.create(self.node.clone()).await.expect("register self");
        stack.keys.current().await.expect("generate first key");

        TestNode {
            node: self.node,
            time,
            trust,
            nodes,
            sent,
            inbox,
            restore,
            networks,
            storage,
            stack,
        }
    }
}

/// A local node that already trusts one remote peer, with a scripted
/// transport standing in for the remote.
pub struct NodePair {
    pub local: TestNode,
    pub remote: Node,
    pub remote_key: KeyId,
    pub remote_pair: NodeKeyPair,
    pub transport: Arc<MockTransport>,
    pub registry: Arc<SyncRegistry>,
    pub time: Arc<MockTimeSource>,
    sync: SyncConfig,
}

impl NodePair {
    pub async fn new() -> Self {
        Self::with_sync(SyncConfig::default()).await
    }

    pub async fn with_sync(sync: SyncConfig) -> Self {
        let remote_pair = NodeKeyPair::generate();
        let transport = Arc::new(MockTransport::new(remote_pair.clone()));
        let local = TestNode::builder("10.0.0.1")
            .config(NotifyConfig {
                sync: sync.clone(),
                ..NotifyConfig::default()
            })
            .transport(transport.clone())
            .build()
            .await;

        let remote = test_node("10.0.0.2");
        local.knows(&remote).await;
        let remote_key = KeyId::new_random();
        let origin = remote.primary_ip().expect("remote address");
        local
            .trust
            .create(NodeKey::new(
                remote_key,
                remote.id,
                remote_pair.public(),
                origin,
                local.time.now(),
                KeyConfig::default().key_lifetime(),
            ))
            .await
            .expect("trust remote key");

        let registry = Arc::clone(&local.stack.sync);
        let time = Arc::clone(&local.time);
        Self {
            local,
            remote,
            remote_key,
            remote_pair,
            transport,
            registry,
            time,
            sync,
        }
    }

    /// A fresh emulator over the local node's sender and registry.
    pub fn emulator(&self) -> SyncRpcEmulator {
        SyncRpcEmulator::new(
            Arc::clone(&self.local.stack.sender),
            Arc::clone(&self.registry),
            self.time.clone(),
            self.sync.clone(),
        )
    }
}
