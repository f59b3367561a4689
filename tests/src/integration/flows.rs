//! # Integration Test Flows
//!
//! ## Flows Tested:
//!
//! 1. **Health check**: synchronous call, bootstrap on first contact, reply
//!    correlated through the caller's inbox
//! 2. **Concurrent first contact**: many deliveries racing to introduce
//!    one key leave exactly one trust record
//! 3. **Shared calls**: identical calls collapse into one remote request
//! 4. **Timeout**: a peer that never answers
//! 5. **At-least-once**: a redelivered envelope runs its handler again

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fleet_notify::adapters::HealthStatus;
    use fleet_notify::{InboundRequest, NotifyConfig, ProcessingStatus, SyncError};
    use serde_json::json;
    use shared_crypto::seal;
    use shared_types::{NotificationId, NotificationMessage, NotificationType};

    use crate::fleet::{eventually, fast_sync, Fleet};

    // =============================================================================
    // SYNCHRONOUS CALLS
    // =============================================================================

    #[tokio::test]
    async fn test_health_check_between_two_nodes() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        fleet.provision(0, 1).await;

        let status: HealthStatus = fleet[0]
            .test
            .stack
            .rpc
            .call(&fleet[1].id(), NotificationType::HealthCheck, &json!({}))
            .await
            .unwrap();

        assert_eq!(status.node_id, fleet[1].id());
        assert_eq!(status.status, "ok");

        // B learned A's key on first contact, bound to A's address.
        let learned = fleet[1].test.trust.keys_for(&fleet[0].id());
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[0].bound_origin, fleet[0].test.node.primary_ip().unwrap());

        // The reply went through A's inbox and resolved the waiter.
        assert_eq!(fleet[0].test.stack.sync.waiting(), 0);
        let replies = fleet[0].test.inbox.all();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].notification_type, NotificationType::HealthCheckResponse);
    }

    #[tokio::test]
    async fn test_identical_calls_reach_peer_once() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        fleet.provision(0, 1).await;
        let rpc = fleet[0].test.stack.rpc.clone();
        let target = fleet[1].id();

        let calls = (0..5).map(|_| {
            let rpc = rpc.clone();
            async move {
                rpc.call_value(&target, NotificationType::HealthCheck, &json!({"deep": true}))
                    .await
            }
        });
        let results = futures::future::join_all(calls).await;
        let first = results[0].as_ref().unwrap().clone();
        for result in &results {
            assert_eq!(result.as_ref().unwrap(), &first);
        }

        // A later identical call is answered from the completed slot.
        let again = rpc
            .call_value(&target, NotificationType::HealthCheck, &json!({"deep": true}))
            .await
            .unwrap();
        assert_eq!(again, first);

        let requests = fleet[1]
            .test
            .inbox
            .all()
            .into_iter()
            .filter(|row| row.notification_type == NotificationType::HealthCheck)
            .count();
        assert_eq!(requests, 1);
    }

    #[tokio::test]
    async fn test_unanswered_call_times_out() {
        let config = NotifyConfig {
            sync: fleet_notify::SyncConfig {
                timeout: Duration::from_millis(200),
                ..fast_sync()
            },
            ..NotifyConfig::default()
        };
        let fleet = Fleet::builder()
            .members(&["10.0.0.1", "10.0.0.2"])
            .config(config)
            .without_health_check()
            .build()
            .await;
        fleet.provision(0, 1).await;

        let err = fleet[0]
            .test
            .stack
            .rpc
            .call_value(&fleet[1].id(), NotificationType::HealthCheck, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }), "got {err}");
        assert_eq!(fleet[0].test.stack.sync.waiting(), 0);

        // B stored the request and failed it for lack of a handler.
        let inbox = fleet[1].test.inbox.clone();
        eventually("unhandled request to fail", || {
            inbox
                .all()
                .iter()
                .any(|row| row.processing_status == ProcessingStatus::Error)
        })
        .await;
    }

    // =============================================================================
    // ONE-WAY DELIVERY
    // =============================================================================

    #[tokio::test]
    async fn test_concurrent_first_contact_creates_one_key() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        fleet.provision(0, 1).await;
        let sender = fleet[0].test.stack.sender.clone();
        let target = fleet[1].id();

        let sends = (0..10).map(|i| {
            let sender = sender.clone();
            async move {
                sender
                    .send(&target, NotificationType::PeerHello, json!({ "n": i }), false)
                    .await
            }
        });
        for result in futures::future::join_all(sends).await {
            result.unwrap();
        }

        assert_eq!(fleet[1].test.trust.keys_for(&fleet[0].id()).len(), 1);
        let hellos = fleet[1].hellos.clone();
        eventually("all hellos handled", || hellos.count() == 10).await;
    }

    #[tokio::test]
    async fn test_resolve_nodes_receipt_names_both_ends() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        fleet.provision(0, 1).await;

        let receipt = fleet[0]
            .test
            .stack
            .sender
            .send(&fleet[1].id(), NotificationType::PeerHello, json!({}), true)
            .await
            .unwrap();

        assert_eq!(receipt.resolved_sender.unwrap().id, fleet[0].id());
        assert_eq!(receipt.resolved_recipient.unwrap().id, fleet[1].id());
    }

    #[tokio::test]
    async fn test_redelivered_envelope_is_handled_again() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2"]).await;
        let (a, b) = (&fleet[0], &fleet[1]);
        let from = a.test.stack.keys.current().await.unwrap();
        let to = b.test.stack.keys.current().await.unwrap();

        let message = NotificationMessage {
            id: NotificationId::new(),
            notification_type: NotificationType::PeerHello,
            from_node: a.id(),
            to_node: b.id(),
            resolve_nodes: false,
            payload: json!({"hello": "again"}),
        };
        let request = InboundRequest {
            envelope: seal(&serde_json::to_vec(&message).unwrap(), &from.pair, &to.record.public_key)
                .unwrap(),
            from_node: a.id(),
            from_key: from.key_id(),
            to_key: to.key_id(),
            origin: a.test.node.primary_ip().unwrap(),
            restore_key: None,
        };

        b.test.stack.receiver.receive(request.clone()).await.unwrap();
        b.test.stack.receiver.receive(request).await.unwrap();

        let hellos = b.hellos.clone();
        eventually("both deliveries handled", || hellos.count() == 2).await;
        let rows = b.test.inbox.all();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.notification_id == message.id));
    }

    #[tokio::test]
    async fn test_send_to_self_is_inline() {
        let fleet = Fleet::new(&["10.0.0.1"]).await;
        let me = fleet[0].id();

        fleet[0]
            .test
            .stack
            .sender
            .send(&me, NotificationType::PeerHello, json!({}), false)
            .await
            .unwrap();

        let hellos = fleet[0].hellos.clone();
        eventually("inline hello handled", || hellos.count() == 1).await;
        // Inline delivery never persists a received row.
        assert!(fleet[0].test.inbox.is_empty());
    }
}
