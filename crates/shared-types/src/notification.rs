//! # Notification Messages
//!
//! The catalogue of notification types and the plaintext structures that
//! travel inside an encrypted envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::{Node, NodeId, NotificationId};
use crate::errors::TypeError;

macro_rules! notification_types {
    ($($(#[$meta:meta])* $variant:ident = $wire:literal,)+) => {
        /// Every message kind exchanged between nodes.
        ///
        /// Wire names are snake_case, except the geo families which keep
        /// their camelCase prefix (`geoLocation_driver_geolocate`).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum NotificationType {
            $($(#[$meta])* #[serde(rename = $wire)] $variant,)+
        }

        impl NotificationType {
            /// All known types, in declaration order.
            pub const ALL: &'static [NotificationType] = &[$(NotificationType::$variant,)+];

            /// Wire name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(NotificationType::$variant => $wire,)+
                }
            }
        }
    };
}

notification_types! {
    // network-level
    HealthCheck = "health_check",
    HealthCheckResponse = "health_check_response",
    HelloToSage = "hello_to_sage",
    HelloFromSage = "hello_from_sage",
    PeerHello = "peer_hello",
    SyncAccount = "sync_account",
    RegisterBackup = "register_backup",
    RetrieveBackup = "retrieve_backup",
    BackupResponse = "backup_response",
    RestoreComplete = "restore_complete",
    Fork = "fork",

    // upgrades
    UpgradeRequest = "upgrade_request",
    UpgradeResponse = "upgrade_response",
    UpgradeAppsRequest = "upgrade_apps_request",
    UpgradeAppsResponse = "upgrade_apps_response",

    // delegated dns driver
    DnsDriverSetNetwork = "dns_driver_set_network",
    DnsDriverSetNode = "dns_driver_set_node",
    DnsDriverDeleteNode = "dns_driver_delete_node",
    DnsDriverCreate = "dns_driver_create",
    DnsDriverList = "dns_driver_list",
    DnsDriverUpdate = "dns_driver_update",
    DnsDriverRemove = "dns_driver_remove",
    DnsDriverResponse = "dns_driver_response",

    // delegated geo drivers
    GeoLocationDriverGeolocate = "geoLocation_driver_geolocate",
    GeoLocationDriverResponse = "geoLocation_driver_response",
    GeoCodeDriverGeocode = "geoCode_driver_geocode",
    GeoCodeDriverResponse = "geoCode_driver_response",
    GeoTimeDriverGeotime = "geoTime_driver_geotime",
    GeoTimeDriverResponse = "geoTime_driver_response",

    // delegated compute driver
    ComputeDriverGetSizes = "compute_driver_get_sizes",
    ComputeDriverGetRegions = "compute_driver_get_regions",
    ComputeDriverGetOs = "compute_driver_get_os",
    ComputeDriverStart = "compute_driver_start",
    ComputeDriverCleanupStart = "compute_driver_cleanup_start",
    ComputeDriverStop = "compute_driver_stop",
    ComputeDriverStatus = "compute_driver_status",
    ComputeDriverResponse = "compute_driver_response",

    // delegated messaging drivers
    EmailDriverSend = "email_driver_send",
    EmailDriverResponse = "email_driver_response",
    SmsDriverSend = "sms_driver_send",
    SmsDriverResponse = "sms_driver_response",
    AuthenticatorDriverSend = "authenticator_driver_send",
    AuthenticatorDriverResponse = "authenticator_driver_response",

    // delegated storage driver
    StorageDriverExists = "storage_driver_exists",
    StorageDriverReadMetadata = "storage_driver_read_metadata",
    StorageDriverRead = "storage_driver_read",
    StorageDriverWrite = "storage_driver_write",
    StorageDriverList = "storage_driver_list",
    StorageDriverListNext = "storage_driver_list_next",
    StorageDriverDelete = "storage_driver_delete",
    StorageDriverDeleteNetwork = "storage_driver_delete_network",
    StorageDriverResponse = "storage_driver_response",

    // delegated payment driver
    PaymentDriverValidate = "payment_driver_validate",
    PaymentDriverClaim = "payment_driver_claim",
    PaymentDriverAmountDue = "payment_driver_amount_due",
    PaymentDriverAuthorize = "payment_driver_authorize",
    PaymentDriverCancelAuthorization = "payment_driver_cancel_authorization",
    PaymentDriverPurchase = "payment_driver_purchase",
    PaymentDriverRefund = "payment_driver_refund",
    PaymentDriverResponse = "payment_driver_response",
}

impl NotificationType {
    /// Reply types carry a `SyncReply` and resolve a waiting caller.
    pub fn is_response(&self) -> bool {
        use NotificationType::*;
        matches!(
            self,
            HealthCheckResponse
                | UpgradeResponse
                | UpgradeAppsResponse
                | DnsDriverResponse
                | GeoLocationDriverResponse
                | GeoCodeDriverResponse
                | GeoTimeDriverResponse
                | ComputeDriverResponse
                | EmailDriverResponse
                | SmsDriverResponse
                | AuthenticatorDriverResponse
                | StorageDriverResponse
                | PaymentDriverResponse
        )
    }

    /// The reply type a handler uses to answer this request, if any.
    pub fn reply_type(&self) -> Option<NotificationType> {
        use NotificationType::*;
        let reply = match self {
            HealthCheck => HealthCheckResponse,
            UpgradeRequest => UpgradeResponse,
            UpgradeAppsRequest => UpgradeAppsResponse,
            DnsDriverSetNetwork | DnsDriverSetNode | DnsDriverDeleteNode | DnsDriverCreate
            | DnsDriverList | DnsDriverUpdate | DnsDriverRemove => DnsDriverResponse,
            GeoLocationDriverGeolocate => GeoLocationDriverResponse,
            GeoCodeDriverGeocode => GeoCodeDriverResponse,
            GeoTimeDriverGeotime => GeoTimeDriverResponse,
            ComputeDriverGetSizes | ComputeDriverGetRegions | ComputeDriverGetOs
            | ComputeDriverStart | ComputeDriverCleanupStart | ComputeDriverStop
            | ComputeDriverStatus => ComputeDriverResponse,
            EmailDriverSend => EmailDriverResponse,
            SmsDriverSend => SmsDriverResponse,
            AuthenticatorDriverSend => AuthenticatorDriverResponse,
            StorageDriverExists | StorageDriverReadMetadata | StorageDriverRead
            | StorageDriverWrite | StorageDriverList | StorageDriverListNext
            | StorageDriverDelete | StorageDriverDeleteNetwork => StorageDriverResponse,
            PaymentDriverValidate | PaymentDriverClaim | PaymentDriverAmountDue
            | PaymentDriverAuthorize | PaymentDriverCancelAuthorization | PaymentDriverPurchase
            | PaymentDriverRefund => PaymentDriverResponse,
            _ => return None,
        };
        Some(reply)
    }

    /// Whether concurrent identical calls of this type may share one reply.
    ///
    /// Payment validation depends on account state outside the message, so
    /// an identical request can legitimately produce a different answer.
    pub fn can_return_cached_response(&self) -> bool {
        *self != NotificationType::PaymentDriverValidate
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownNotificationType(s.to_string()))
    }
}

/// Plaintext carried inside an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub from_node: NodeId,
    pub to_node: NodeId,
    /// Ask the receiver to fill in the receipt's node identities.
    #[serde(default)]
    pub resolve_nodes: bool,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Acknowledgement returned for a delivered notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_sender: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_recipient: Option<Node>,
}

/// Payload of every reply type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReply {
    /// Id of the request being answered.
    pub notification_id: NotificationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl SyncReply {
    /// Successful reply.
    pub fn ok(notification_id: NotificationId, response: serde_json::Value) -> Self {
        Self {
            notification_id,
            response: Some(response),
            exception: None,
        }
    }

    /// Reply carrying a remote failure.
    pub fn failed(notification_id: NotificationId, exception: impl Into<String>) -> Self {
        Self {
            notification_id,
            response: None,
            exception: Some(exception.into()),
        }
    }
}
