//! # Attack Simulations
//!
//! Hand-crafted deliveries against a member's receive path.
//!
//! | Module | Attack |
//! |--------|--------|
//! | `origin_spoofing` | Known identity or key presented from the wrong address |
//! | `key_injection` | Extra keys for a node that already has current ones |
//! | `restore_abuse` | Restore tokens outside the conditions they are honoured in |
//! | `envelope_tampering` | Modified ciphertext, swapped keys, misaddressed plaintext |

pub mod envelope_tampering;
pub mod key_injection;
pub mod origin_spoofing;
pub mod restore_abuse;

use std::net::IpAddr;

use fleet_notify::test_utils::TestNode;
use fleet_notify::InboundRequest;
use serde_json::json;
use shared_crypto::{seal, NodeKeyPair};
use shared_types::{KeyId, Node, NotificationId, NotificationMessage, NotificationType};

/// A forged delivery claiming to come from `claimed`.
pub struct Forgery<'a> {
    pub claimed: &'a Node,
    pub pair: NodeKeyPair,
    pub key_id: KeyId,
    pub origin: IpAddr,
    pub restore_key: Option<String>,
}

impl<'a> Forgery<'a> {
    /// Fresh key material, presented from `origin`.
    pub fn new(claimed: &'a Node, origin: &str) -> Self {
        Self {
            claimed,
            pair: NodeKeyPair::generate(),
            key_id: KeyId::new_random(),
            origin: origin.parse().expect("forgery origin"),
            restore_key: None,
        }
    }

    pub fn with_key(mut self, key_id: KeyId, pair: NodeKeyPair) -> Self {
        self.key_id = key_id;
        self.pair = pair;
        self
    }

    pub fn with_restore_key(mut self, token: &str) -> Self {
        self.restore_key = Some(token.to_string());
        self
    }

    /// The plaintext this forgery seals, addressed to `target`.
    pub fn message(&self, target: &TestNode) -> NotificationMessage {
        NotificationMessage {
            id: NotificationId::new(),
            notification_type: NotificationType::PeerHello,
            from_node: self.claimed.id,
            to_node: target.node.id,
            resolve_nodes: false,
            payload: json!({"forged": true}),
        }
    }

    /// Seal `message` to the current key of `target`.
    pub async fn seal_message(&self, target: &TestNode, message: &NotificationMessage) -> InboundRequest {
        let to = target.stack.keys.current().await.expect("target key");
        let plaintext = serde_json::to_vec(message).expect("encode message");
        InboundRequest {
            envelope: seal(&plaintext, &self.pair, &to.record.public_key).expect("seal"),
            from_node: self.claimed.id,
            from_key: self.key_id,
            to_key: to.key_id(),
            origin: self.origin,
            restore_key: self.restore_key.clone(),
        }
    }

    /// A well-formed request to `target`.
    pub async fn request(&self, target: &TestNode) -> InboundRequest {
        let message = self.message(target);
        self.seal_message(target, &message).await
    }
}
