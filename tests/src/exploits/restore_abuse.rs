//! # Restore Token Abuse
//!
//! A restored node may replace its keys with a valid token, while its
//! network is restoring, within the restore window, and only from the
//! node's registered address. Each condition is required on its own.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fleet_notify::test_utils::TestNode;
    use fleet_notify::{NotifyError, Rejection, TimeSource, TrustStore};
    use serde_json::json;
    use shared_types::{NetworkState, NetworkStatus, NotificationType};

    use crate::exploits::Forgery;
    use crate::fleet::Fleet;

    const TOKEN: &str = "restore-7f3a";

    /// A and B introduced; B honours `TOKEN` and sees A's network restoring.
    async fn restoring() -> Fleet {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        fleet.provision(0, 1).await;
        fleet[0]
            .test
            .stack
            .sender
            .send(&fleet[1].id(), NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap();
        fleet[1].test.restore.add_token(TOKEN);
        fleet[1].test.networks.set(NetworkState {
            network: fleet[0].test.node.network,
            status: NetworkStatus::Restoring,
            since: fleet.time.now(),
        });
        fleet
    }

    fn assert_not_trusted(err: &NotifyError) {
        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::KeyNotTrusted { .. })),
            "got {err}"
        );
    }

    #[tokio::test]
    async fn test_restored_node_replaces_key() {
        let fleet = restoring().await;

        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_restore_key(TOKEN)
            .request(&fleet[1].test)
            .await;
        fleet[1].test.stack.receiver.receive(request).await.unwrap();

        assert_eq!(fleet[1].test.trust.keys_for(&fleet[0].id()).len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let fleet = restoring().await;

        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_restore_key("restore-guess")
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert_not_trusted(&err);
    }

    #[tokio::test]
    async fn test_revoked_token_rejected() {
        let fleet = restoring().await;
        assert!(fleet[1].test.restore.revoke(TOKEN));

        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_restore_key(TOKEN)
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert_not_trusted(&err);
    }

    #[tokio::test]
    async fn test_token_ignored_when_network_running() {
        let fleet = restoring().await;
        fleet[1].test.networks.set(NetworkState {
            network: fleet[0].test.node.network,
            status: NetworkStatus::Running,
            since: fleet.time.now(),
        });

        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_restore_key(TOKEN)
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert_not_trusted(&err);
    }

    #[tokio::test]
    async fn test_token_ignored_after_restore_window() {
        let fleet = restoring().await;
        fleet.advance(Duration::from_secs(24 * 60 * 60 + 1));

        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_restore_key(TOKEN)
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert_not_trusted(&err);
    }

    #[tokio::test]
    async fn test_token_does_not_move_bound_origin() {
        let fleet = restoring().await;

        let request = Forgery::new(&fleet[0].test.node, "10.66.6.6")
            .with_restore_key(TOKEN)
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::NodeOriginChanged { .. })),
            "got {err}"
        );
        assert_eq!(fleet[1].test.trust.keys_for(&fleet[0].id()).len(), 1);
    }

    /// A node rebuilt from backup: same identity and address, no keys.
    async fn reborn(fleet: &Fleet) -> TestNode {
        let original = &fleet[0].test.node;
        let node = TestNode::builder(&original.fqdn)
            .node(original.clone())
            .time(fleet.time.clone())
            .transport(fleet.network.transport(original.primary_ip().unwrap()))
            .build()
            .await;
        node.knows(&fleet[1].test.node).await;
        for record in fleet[1].test.stack.keys.records() {
            node.trust.create(record).await.unwrap();
        }
        node
    }

    #[tokio::test]
    async fn test_rebuilt_node_recovers_with_configured_token() {
        let fleet = restoring().await;
        let node = reborn(&fleet).await;

        let err = node
            .stack
            .sender
            .send(&fleet[1].id(), NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap_err();
        assert!(err.is_forbidden(), "got {err}");

        node.stack.sender.set_restore_key(Some(TOKEN.to_string()));
        node.stack
            .sender
            .send(&fleet[1].id(), NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap();

        let known = fleet[1].test.trust.keys_for(&fleet[0].id());
        assert_eq!(known.len(), 2);
        let new_key = node.stack.keys.current().await.unwrap();
        assert!(known.iter().any(|k| k.key_id == new_key.key_id()));
    }
}
