//! # Envelope Tampering
//!
//! An accepted key only admits a delivery whose envelope opens under that
//! key and whose plaintext names the same sender and this node.

#[cfg(test)]
mod tests {
    use fleet_notify::NotifyError;
    use shared_crypto::NodeKeyPair;
    use shared_types::NodeId;

    use crate::exploits::Forgery;
    use crate::fleet::Fleet;

    async fn two_nodes() -> Fleet {
        Fleet::new(&["10.0.0.1", "10.0.0.2"]).await
    }

    fn flip_hex(hex: &str) -> String {
        let mut chars: Vec<char> = hex.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[tokio::test]
    async fn test_flipped_ciphertext_rejected() {
        let fleet = two_nodes().await;
        let own = fleet[0].test.stack.keys.current().await.unwrap();
        let mut request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_key(own.key_id(), own.pair.clone())
            .request(&fleet[1].test)
            .await;
        request.envelope.ciphertext = flip_hex(&request.envelope.ciphertext);

        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(matches!(err, NotifyError::Decryption(_)), "got {err}");
        assert!(fleet[1].test.inbox.is_empty());
    }

    #[tokio::test]
    async fn test_flipped_nonce_rejected() {
        let fleet = two_nodes().await;
        let mut request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .request(&fleet[1].test)
            .await;
        request.envelope.nonce = flip_hex(&request.envelope.nonce);

        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(matches!(err, NotifyError::Decryption(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_envelope_sealed_by_other_key_under_known_id_rejected() {
        let fleet = two_nodes().await;
        let own = fleet[0].test.stack.keys.current().await.unwrap();
        // B learns A's real key first.
        let genuine = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_key(own.key_id(), own.pair.clone())
            .request(&fleet[1].test)
            .await;
        fleet[1].test.stack.receiver.receive(genuine).await.unwrap();

        // Same id and address, different key material. The recorded key wins.
        let request = Forgery::new(&fleet[0].test.node, "10.0.0.1")
            .with_key(own.key_id(), NodeKeyPair::generate())
            .request(&fleet[1].test)
            .await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();

        assert!(matches!(err, NotifyError::Decryption(_)), "got {err}");
        let known = fleet[1].test.trust.keys_for(&fleet[0].id());
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].public_key, own.pair.public());
    }

    #[tokio::test]
    async fn test_sealed_sender_must_match_header() {
        let fleet = Fleet::new(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        let forgery = Forgery::new(&fleet[0].test.node, "10.0.0.1");
        let mut message = forgery.message(&fleet[1].test);
        message.from_node = fleet[2].id();

        let request = forgery.seal_message(&fleet[1].test, &message).await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(matches!(err, NotifyError::Malformed(_)), "got {err}");
        assert!(fleet[1].test.inbox.is_empty());
    }

    #[tokio::test]
    async fn test_misaddressed_plaintext_rejected() {
        let fleet = two_nodes().await;
        let forgery = Forgery::new(&fleet[0].test.node, "10.0.0.1");
        let mut message = forgery.message(&fleet[1].test);
        message.to_node = NodeId::new_random();

        let request = forgery.seal_message(&fleet[1].test, &message).await;
        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(matches!(err, NotifyError::Malformed(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_plaintext_that_is_not_a_notification_rejected() {
        let fleet = two_nodes().await;
        let forgery = Forgery::new(&fleet[0].test.node, "10.0.0.1");
        let to = fleet[1].test.stack.keys.current().await.unwrap();
        let mut request = forgery.request(&fleet[1].test).await;
        request.envelope =
            shared_crypto::seal(b"[1, 2, 3]", &forgery.pair, &to.record.public_key).unwrap();

        let err = fleet[1].test.stack.receiver.receive(request).await.unwrap_err();
        assert!(matches!(err, NotifyError::Malformed(_)), "got {err}");
    }
}
