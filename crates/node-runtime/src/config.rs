//! # Node Configuration
//!
//! One TOML file per node, with `FLEET_*` environment overrides applied on
//! top. Missing sections fall back to defaults; the node's identity is
//! required.
//!
//! ```toml
//! [identity]
//! id = "6f1c..."
//! network = "..."
//! domain = "..."
//! account = "..."
//! fqdn = "node-a.fleet.internal"
//! ip4 = "10.0.0.1"
//! admin_port = 1202
//!
//! [http]
//! bind = "0.0.0.0:1202"
//!
//! [[peers]]
//! id = "..."
//! ...
//! key_id = "..."
//! public_key = "<64 hex chars>"
//! ```

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use fleet_notify::NotifyConfig;
use fleet_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use shared_crypto::{NodeKeyPair, PublicKeyBytes};
use shared_types::{AccountId, DomainId, KeyId, NetworkId, Node, NodeId};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error(transparent)]
    Notify(#[from] fleet_notify::domain::ConfigError),

    #[error(transparent)]
    Telemetry(#[from] fleet_telemetry::TelemetryError),
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> NodeConfigError {
    NodeConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node.
    pub identity: IdentityConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Extra addresses treated as this node's own for origin checks.
    #[serde(default)]
    pub local_addresses: Vec<IpAddr>,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Nodes known at startup.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
    /// Tokens that let a node re-bind to a new address while its network
    /// is restoring.
    #[serde(default)]
    pub restore_tokens: Vec<String>,
    /// Networks to mark as restoring at startup.
    #[serde(default)]
    pub restoring_networks: Vec<NetworkId>,
}

/// This node's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub id: NodeId,
    pub network: NetworkId,
    pub domain: DomainId,
    pub account: AccountId,
    pub fqdn: String,
    #[serde(default)]
    pub ip4: Option<Ipv4Addr>,
    #[serde(default)]
    pub ip6: Option<Ipv6Addr>,
    pub admin_port: u16,
    #[serde(default)]
    pub tls: bool,
    /// Fixed key id for `secret_key`. Both or neither.
    #[serde(default)]
    pub key_id: Option<KeyId>,
    /// X25519 secret as hex. Without one a key is generated at startup.
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Restore token sent with every outbound notification.
    #[serde(default)]
    pub restore_key: Option<String>,
}

impl IdentityConfig {
    pub fn node(&self) -> Node {
        Node {
            id: self.id,
            network: self.network,
            domain: self.domain,
            account: self.account,
            fqdn: self.fqdn.clone(),
            ip4: self.ip4,
            ip6: self.ip6,
            admin_port: self.admin_port,
            tls: self.tls,
        }
    }

    /// The configured fixed key, if any.
    pub fn fixed_key(&self) -> Result<Option<(KeyId, NodeKeyPair)>, NodeConfigError> {
        match (&self.key_id, &self.secret_key) {
            (None, None) => Ok(None),
            (Some(key_id), Some(secret)) => {
                let bytes = hex_to_32(secret).ok_or_else(|| {
                    invalid("identity.secret_key", "expected 64 hex characters")
                })?;
                Ok(Some((*key_id, NodeKeyPair::from_secret_bytes(bytes))))
            }
            _ => Err(invalid(
                "identity.key_id",
                "key_id and secret_key must be set together",
            )),
        }
    }
}

fn hex_to_32(s: &str) -> Option<[u8; 32]> {
    hex::decode(s.trim()).ok()?.try_into().ok()
}

/// HTTP listener and client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: SocketAddr,
    /// Largest accepted `POST /notify` body in bytes.
    pub body_limit: usize,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 1202)),
            body_limit: fleet_notify::adapters::DEFAULT_BODY_LIMIT,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A node known at startup, optionally with one trusted key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub id: NodeId,
    pub network: NetworkId,
    pub domain: DomainId,
    pub account: AccountId,
    pub fqdn: String,
    #[serde(default)]
    pub ip4: Option<Ipv4Addr>,
    #[serde(default)]
    pub ip6: Option<Ipv6Addr>,
    pub admin_port: u16,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub key_id: Option<KeyId>,
    /// X25519 public key as hex.
    #[serde(default)]
    pub public_key: Option<String>,
}

impl PeerConfig {
    pub fn node(&self) -> Node {
        Node {
            id: self.id,
            network: self.network,
            domain: self.domain,
            account: self.account,
            fqdn: self.fqdn.clone(),
            ip4: self.ip4,
            ip6: self.ip6,
            admin_port: self.admin_port,
            tls: self.tls,
        }
    }

    /// The configured trusted key, if any.
    pub fn trusted_key(&self) -> Result<Option<(KeyId, PublicKeyBytes)>, NodeConfigError> {
        match (&self.key_id, &self.public_key) {
            (None, None) => Ok(None),
            (Some(key_id), Some(hex)) => {
                let public = PublicKeyBytes::from_hex(hex.trim())
                    .map_err(|e| invalid(format!("peers.{}.public_key", self.id), e.to_string()))?;
                Ok(Some((*key_id, public)))
            }
            _ => Err(invalid(
                format!("peers.{}", self.id),
                "key_id and public_key must be set together",
            )),
        }
    }
}

impl NodeConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, NodeConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read, parse, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, NodeConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| NodeConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text)?.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FLEET_*` overrides.
    ///
    /// - `FLEET_BIND`: listener address
    /// - `FLEET_FQDN`: advertised host name
    /// - `FLEET_ADMIN_PORT`: advertised port
    /// - `FLEET_SECRET_KEY`: node secret key (hex)
    /// - `FLEET_RESTORE_KEY`: restore token sent with outbound notifications
    pub fn with_env_overrides(mut self) -> Result<Self, NodeConfigError> {
        if let Ok(bind) = env::var("FLEET_BIND") {
            self.http.bind = bind
                .parse()
                .map_err(|_| invalid("FLEET_BIND", format!("not a socket address: {bind}")))?;
        }
        if let Ok(fqdn) = env::var("FLEET_FQDN") {
            self.identity.fqdn = fqdn;
        }
        if let Ok(port) = env::var("FLEET_ADMIN_PORT") {
            self.identity.admin_port = port
                .parse()
                .map_err(|_| invalid("FLEET_ADMIN_PORT", format!("not a port: {port}")))?;
        }
        if let Ok(secret) = env::var("FLEET_SECRET_KEY") {
            self.identity.secret_key = Some(secret);
        }
        if let Ok(restore) = env::var("FLEET_RESTORE_KEY") {
            self.identity.restore_key = Some(restore);
        }
        self.telemetry = self.telemetry.with_env_overrides();
        Ok(self)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), NodeConfigError> {
        if self.identity.fqdn.trim().is_empty() {
            return Err(invalid("identity.fqdn", "must not be empty"));
        }
        if self.identity.admin_port == 0 {
            return Err(invalid("identity.admin_port", "must not be 0"));
        }
        if self.http.body_limit == 0 {
            return Err(invalid("http.body_limit", "must be > 0"));
        }
        self.identity.fixed_key()?;
        for peer in &self.peers {
            if peer.id == self.identity.id {
                return Err(invalid(format!("peers.{}", peer.id), "peer has this node's id"));
            }
            if peer.ip4.is_none() && peer.ip6.is_none() {
                return Err(invalid(format!("peers.{}", peer.id), "needs ip4 or ip6"));
            }
            peer.trusted_key()?;
        }
        self.notify.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}
