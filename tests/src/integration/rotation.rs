//! # Key Rotation
//!
//! Keys live three generation limits. Once every key a peer holds for us
//! is inside the last generation limit, we rotate and the peer accepts the
//! replacement from the same address without any operator action.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fleet_notify::adapters::HealthStatus;
    use fleet_notify::KeyConfig;
    use serde_json::json;
    use shared_types::NotificationType;

    use crate::fleet::{eventually, Fleet};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn test_rotated_key_accepted_in_grace_window() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        fleet.provision(0, 1).await;
        let (a, b) = (&fleet[0], &fleet[1]);
        let first = a.test.stack.keys.current().await.unwrap();

        a.test
            .stack
            .sender
            .send(&b.id(), NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap();

        // Two days in, one generation limit of lifetime is left.
        fleet.advance(2 * DAY + Duration::from_secs(1));
        let second = a.test.stack.keys.current().await.unwrap();
        assert_ne!(first.key_id(), second.key_id());

        a.test
            .stack
            .sender
            .send(&b.id(), NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap();

        let known = b.test.trust.keys_for(&a.id());
        assert_eq!(known.len(), 2);
        assert!(known.iter().any(|k| k.key_id == second.key_id()));
        let hellos = b.hellos.clone();
        eventually("both hellos handled", || hellos.count() == 2).await;
    }

    #[tokio::test]
    async fn test_both_sides_rotate_during_health_check() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        fleet.provision(0, 1).await;
        let (a, b) = (&fleet[0], &fleet[1]);

        let _: HealthStatus = a
            .test
            .stack
            .rpc
            .call(&b.id(), NotificationType::HealthCheck, &json!({"round": 1}))
            .await
            .unwrap();

        fleet.advance(2 * DAY + Duration::from_secs(1));
        let status: HealthStatus = a
            .test
            .stack
            .rpc
            .call(&b.id(), NotificationType::HealthCheck, &json!({"round": 2}))
            .await
            .unwrap();
        assert_eq!(status.node_id, b.id());

        // Each side generated a second key and the other accepted it.
        assert_eq!(b.test.trust.keys_for(&a.id()).len(), 2);
        assert_eq!(a.test.trust.keys_for(&b.id()).len(), 2);
    }

    #[tokio::test]
    async fn test_key_lifetime_is_three_generation_limits() {
        let config = KeyConfig::default();
        assert_eq!(config.key_lifetime(), 3 * DAY);

        let fleet = Fleet::new(&["10.0.0.1"]).await;
        let key = fleet[0].test.stack.keys.current().await.unwrap();
        assert_eq!(
            key.record.expires_at.as_millis() - key.record.created_at.as_millis(),
            (3 * DAY).as_millis() as u64
        );
    }
}
