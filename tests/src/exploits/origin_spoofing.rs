//! # Origin Spoofing
//!
//! A key is bound to the address it was first seen from, and a node is
//! bound to the address of its keys. Neither a stolen key nor a new key
//! opens the door from anywhere else.

#[cfg(test)]
mod tests {
    use fleet_notify::{NotifyError, Rejection};
    use serde_json::json;
    use shared_types::NotificationType;

    use crate::exploits::Forgery;
    use crate::fleet::Fleet;

    const ATTACKER: &str = "10.66.6.6";

    async fn introduced() -> Fleet {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        fleet.provision(0, 1).await;
        fleet[0]
            .test
            .stack
            .sender
            .send(&fleet[1].id(), NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap();
        fleet
    }

    #[tokio::test]
    async fn test_stolen_key_from_other_address_rejected() {
        let fleet = introduced().await;
        let stolen = fleet[0].test.stack.keys.current().await.unwrap();

        let request = Forgery::new(&fleet[0].test.node, ATTACKER)
            .with_key(stolen.key_id(), stolen.pair.clone())
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();

        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::OriginMismatch { .. })),
            "got {err}"
        );
        assert_eq!(fleet[1].test.inbox.len(), 1);
    }

    #[tokio::test]
    async fn test_new_key_for_bound_node_from_other_address_rejected() {
        let fleet = introduced().await;

        let request = Forgery::new(&fleet[0].test.node, ATTACKER)
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();

        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::NodeOriginChanged { .. })),
            "got {err}"
        );
        assert_eq!(fleet[1].test.trust.keys_for(&fleet[0].id()).len(), 1);
    }

    #[tokio::test]
    async fn test_moved_node_is_refused_by_peer() {
        let fleet = introduced().await;
        fleet[0].transport.set_origin("10.0.0.99".parse().unwrap());

        let err = fleet[0]
            .test
            .stack
            .sender
            .send(&fleet[1].id(), NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap_err();

        assert!(err.is_forbidden(), "got {err}");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_first_contact_binds_origin_and_locks_out_late_claimant() {
        // No prior key: whoever speaks first for a node binds its address.
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        let early = Forgery::new(&fleet[0].test.node, ATTACKER)
            .request(&fleet[1].test)
            .await;
        fleet[1].test.stack.receiver.receive(early).await.unwrap();

        let known = fleet[1].test.trust.keys_for(&fleet[0].id());
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].bound_origin, ATTACKER.parse::<std::net::IpAddr>().unwrap());

        fleet.provision(0, 1).await;
        let err = fleet[0]
            .test
            .stack
            .sender
            .send(&fleet[1].id(), NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap_err();
        assert!(err.is_forbidden(), "got {err}");
    }

    #[tokio::test]
    async fn test_loopback_alias_accepted_for_own_key() {
        // A node's own key is bound to its primary address; loopback is a
        // local alias of it.
        let fleet = Fleet::new(&["10.0.0.1"]).await;
        let own = fleet[0].test.stack.keys.current().await.unwrap();

        let request = Forgery::new(&fleet[0].test.node, "127.0.0.1")
            .with_key(own.key_id(), own.pair.clone())
            .request(&fleet[0].test)
            .await;
        fleet[0].test.stack.receiver.receive(request).await.unwrap();
    }

    #[tokio::test]
    async fn test_loopback_is_not_an_alias_for_peer_keys() {
        let fleet = introduced().await;
        let stolen = fleet[0].test.stack.keys.current().await.unwrap();

        let request = Forgery::new(&fleet[0].test.node, "127.0.0.1")
            .with_key(stolen.key_id(), stolen.pair.clone())
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();

        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::OriginMismatch { .. })),
            "got {err}"
        );
    }
}
