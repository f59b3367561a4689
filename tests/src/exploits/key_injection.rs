//! # Key Injection
//!
//! Once a node has a current key, a second one is only accepted inside the
//! rotation window or through a restore. Unknown identities and keys are
//! refused before any key material is considered.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fleet_notify::{NotifyConfig, NotifyError, Rejection};
    use serde_json::json;
    use shared_types::{KeyId, NotificationType};

    use crate::exploits::Forgery;
    use crate::fleet::{fast_sync, Fleet};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

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
    async fn test_second_key_from_same_address_rejected() {
        let fleet = introduced().await;

        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();

        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::KeyNotTrusted { .. })),
            "got {err}"
        );
        assert_eq!(fleet[1].test.trust.keys_for(&fleet[0].id()).len(), 1);
    }

    #[tokio::test]
    async fn test_second_key_rejected_just_before_grace_window() {
        let fleet = introduced().await;
        // Current key still has a little more than one generation limit left.
        fleet.advance(2 * DAY - Duration::from_secs(60));

        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::KeyNotTrusted { .. })),
            "got {err}"
        );
    }

    #[tokio::test]
    async fn test_same_material_under_new_id_maps_to_existing_key() {
        let fleet = introduced().await;
        let current = fleet[0].test.stack.keys.current().await.unwrap();

        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_key(KeyId::new_random(), current.pair.clone())
            .request(&fleet[1].test)
            .await;
        fleet[1].test.stack.receiver.receive(request).await.unwrap();

        let known = fleet[1].test.trust.keys_for(&fleet[0].id());
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].key_id, current.key_id());
    }

    #[tokio::test]
    async fn test_unregistered_sender_rejected() {
        let fleet = Fleet::new(&["10.0.0.2"]).await;
        let stranger = fleet_notify::test_utils::fleet_node("10.0.0.9", &fleet[0].test.node);

        let request = Forgery::new(&stranger, "10.0.0.9").request(&fleet[0].test).await;
        let err = fleet[0].test.stack.receiver.receive(request).await.unwrap_err();

        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::UnknownSender(id)) if id == stranger.id),
            "got {err}"
        );
        assert!(fleet[0].test.trust.keys_for(&stranger.id).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_recipient_key_rejected() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        let mut request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .request(&fleet[1].test)
            .await;
        request.to_key = KeyId::new_random();

        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::UnknownRecipientKey(_))),
            "got {err}"
        );
        // Rejected before discovery, so nothing was bootstrapped.
        assert!(fleet[1].test.trust.keys_for(&fleet[0].id()).is_empty());
    }

    #[tokio::test]
    async fn test_foreign_fleet_sender_rejected_when_required() {
        let fleet = Fleet::builder()
            .members(&["10.0.0.1"])
            .foreign_member("10.9.0.1")
            .config(NotifyConfig {
                require_same_fleet: true,
                sync: fast_sync(),
                ..NotifyConfig::default()
            })
            .build()
            .await;

        let request = Forgery::new(&fleet[1].test.node, "10.9.0.1")
            .request(&fleet[0].test)
            .await;
        let err = fleet[0].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(
            matches!(err, NotifyError::Forbidden(Rejection::ForeignSender(_))),
            "got {err}"
        );
    }

    #[tokio::test]
    async fn test_foreign_fleet_sender_accepted_by_default() {
        let fleet = Fleet::builder()
            .members(&["10.0.0.1"])
            .foreign_member("10.9.0.1")
            .build()
            .await;

        let request = Forgery::new(&fleet[1].test.node, "10.9.0.1")
            .request(&fleet[0].test)
            .await;
        fleet[0].test.stack.receiver.receive(request).await.unwrap();
    }
}
