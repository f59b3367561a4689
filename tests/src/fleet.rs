//! # Fleet Fixture
//!
//! Several fully wired nodes sharing one clock and one in-process network.
//! Every member is registered with every other member; keys are exchanged
//! only where a test asks for it, so first contact exercises bootstrap.

use std::ops::Index;
use std::sync::Arc;
use std::time::Duration;

use fleet_notify::adapters::{HealthCheckHandler, StaticHandlerRegistry};
use fleet_notify::test_utils::{
    fleet_node, test_node, CountingHandler, InProcessNetwork, InProcessTransport, MockTimeSource,
    TestNode,
};
use fleet_notify::{NotifyConfig, SyncConfig, TrustStore};
use shared_types::NotificationType;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Clock start shared by every fleet.
pub const FLEET_EPOCH_MS: u64 = 1_700_000_000_000;

/// Sync settings short enough for tests on a real clock.
pub fn fast_sync() -> SyncConfig {
    SyncConfig {
        timeout: Duration::from_secs(5),
        wait: Duration::from_millis(10),
        jitter: Duration::ZERO,
        ..SyncConfig::default()
    }
}

/// One node of a fleet.
pub struct FleetMember {
    pub test: TestNode,
    /// Outbound transport; change its origin to spoof the source address.
    pub transport: Arc<InProcessTransport>,
    /// Counts `peer_hello` deliveries.
    pub hellos: Arc<CountingHandler>,
}

impl FleetMember {
    pub fn id(&self) -> shared_types::NodeId {
        self.test.node.id
    }
}

/// A running fleet. Background tasks stop on drop.
pub struct Fleet {
    pub network: InProcessNetwork,
    pub time: Arc<MockTimeSource>,
    pub members: Vec<FleetMember>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Fleet {
    pub fn builder() -> FleetBuilder {
        FleetBuilder {
            ips: Vec::new(),
            config: NotifyConfig {
                sync: fast_sync(),
                ..NotifyConfig::default()
            },
            health_check: true,
            foreign: Vec::new(),
        }
    }

    /// Members at `ips`, all in one fleet, answering health checks.
    pub async fn new(ips: &[&str]) -> Self {
        Self::builder().members(ips).build().await
    }

    /// Make `from` trust the current keys of `to`, as an operator would
    /// when provisioning a peer.
    pub async fn provision(&self, from: usize, to: usize) {
        for record in self.members[to].test.stack.keys.records() {
            if self.members[from]
                .test
                .trust
                .find_key(&record.node_id, &record.key_id)
                .await
                .expect("trust lookup")
                .is_none()
            {
                self.members[from]
                    .test
                    .trust
                    .create(record)
                    .await
                    .expect("provision key");
            }
        }
    }

    pub fn advance(&self, by: Duration) {
        self.time.advance(by);
    }
}

impl Index<usize> for Fleet {
    type Output = FleetMember;

    fn index(&self, index: usize) -> &FleetMember {
        &self.members[index]
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        for task in &self.tasks {
            task.abort();
        }
    }
}

pub struct FleetBuilder {
    ips: Vec<String>,
    config: NotifyConfig,
    health_check: bool,
    foreign: Vec<String>,
}

impl FleetBuilder {
    pub fn members(mut self, ips: &[&str]) -> Self {
        self.ips.extend(ips.iter().map(|ip| ip.to_string()));
        self
    }

    /// A member with its own network, domain and account.
    pub fn foreign_member(mut self, ip: &str) -> Self {
        self.foreign.push(ip.to_string());
        self
    }

    pub fn config(mut self, config: NotifyConfig) -> Self {
        self.config = config;
        self
    }

    /// Leave `health_check` unhandled so calls time out.
    pub fn without_health_check(mut self) -> Self {
        self.health_check = false;
        self
    }

    pub async fn build(self) -> Fleet {
        let network = InProcessNetwork::new();
        let time = Arc::new(MockTimeSource::new(FLEET_EPOCH_MS));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let first = self.ips.first().map(|ip| test_node(ip));
        let identities = self
            .ips
            .iter()
            .enumerate()
            .map(|(i, ip)| match (&first, i) {
                (Some(first), 0) => first.clone(),
                (Some(first), _) => fleet_node(ip, first),
                (None, _) => test_node(ip),
            })
            .chain(self.foreign.iter().map(|ip| test_node(ip)))
            .collect::<Vec<_>>();

        let mut members = Vec::with_capacity(identities.len());
        for node in identities {
            let origin = node.primary_ip().expect("fleet member address");
            let transport = network.transport(origin);
            let hellos = Arc::new(CountingHandler::default());
            let mut handlers = StaticHandlerRegistry::new()
                .with(NotificationType::PeerHello, hellos.clone());
            if self.health_check {
                handlers.register(
                    NotificationType::HealthCheck,
                    Arc::new(HealthCheckHandler::new(node.id, time.clone())),
                );
            }

            let test = TestNode::builder(&origin.to_string())
                .node(node)
                .config(self.config.clone())
                .time(Arc::clone(&time))
                .transport(transport.clone())
                .handlers(Arc::new(handlers))
                .build()
                .await;
            network.attach(test.node.notify_uri(), test.stack.receiver.clone());
            members.push(FleetMember {
                test,
                transport,
                hellos,
            });
        }

        for member in &members {
            for other in &members {
                if other.id() != member.id() {
                    member.test.knows(&other.test.node).await;
                }
            }
        }

        let mut tasks = Vec::new();
        for member in &members {
            tasks.extend(member.test.stack.start(shutdown_rx.clone()));
        }

        Fleet {
            network,
            time,
            members,
            shutdown,
            tasks,
        }
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_members_know_each_other() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        for member in &fleet.members {
            // self plus two peers
            assert_eq!(member.test.nodes.len(), 3);
            assert!(member.test.node.same_fleet(&fleet[0].test.node));
        }
    }

    #[tokio::test]
    async fn test_provision_copies_current_key() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        assert!(fleet[0].test.trust.keys_for(&fleet[1].id()).is_empty());

        fleet.provision(0, 1).await;
        fleet.provision(0, 1).await;
        assert_eq!(fleet[0].test.trust.keys_for(&fleet[1].id()).len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_member_is_outside_fleet() {
        let fleet = Fleet::builder()
            .members(&["10.0.0.1"])
            .foreign_member("10.9.0.1")
            .build()
            .await;
        assert!(!fleet[1].test.node.same_fleet(&fleet[0].test.node));
    }
}
