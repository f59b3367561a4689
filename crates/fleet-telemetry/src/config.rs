//! Telemetry configuration from file sections and environment variables.

use std::env;

use serde::{Deserialize, Serialize};

use crate::TelemetryError;

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to log records
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive string
    pub log_level: String,

    /// Whether to write logs to stdout
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "fleet-node".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FLEET_SERVICE_NAME`: Service name (default: fleet-node)
    /// - `FLEET_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `FLEET_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `FLEET_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `FLEET_*` overrides on top of values loaded from a file.
    pub fn with_env_overrides(mut self) -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        if let Ok(name) = env::var("FLEET_SERVICE_NAME") {
            self.service_name = name;
        }
        if let Ok(level) = env::var("FLEET_LOG_LEVEL").or_else(|_| env::var("RUST_LOG")) {
            self.log_level = level;
        }
        if let Ok(v) = env::var("FLEET_CONSOLE_OUTPUT") {
            self.console_output = v.to_lowercase() != "false" && v != "0";
        }
        self.json_logs = env::var("FLEET_JSON_LOGS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(self.json_logs || is_container);
        self
    }

    /// Reject configurations the subscriber cannot use.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.service_name.trim().is_empty() {
            return Err(TelemetryError::Config("service_name must not be empty".into()));
        }
        if self.log_level.trim().is_empty() {
            return Err(TelemetryError::Config("log_level must not be empty".into()));
        }
        Ok(())
    }
}
