//! Settings type definitions.
//!
//! All types use camelCase JSON and implement [`Default`] with the values
//! the console ships with. Every section is `#[serde(default)]`, so a
//! settings file only needs the keys it changes.

use std::path::PathBuf;

use pushdeck_core::endpoint::{DEFAULT_PORT, DEVELOPMENT_HOST, PRODUCTION_HOST};
use pushdeck_core::logging::LogFormat;
use pushdeck_core::{DeliveryPriority, Endpoint};
use serde::{Deserialize, Serialize};

/// Root settings for the console.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleSettings {
    /// Gateway connection settings.
    pub gateway: GatewaySettings,
    /// Default credential locations.
    pub credentials: CredentialSettings,
    /// Defaults for composed notifications.
    pub compose: ComposeSettings,
    /// Dispatch scheduler settings.
    pub scheduler: SchedulerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Which gateway environment to talk to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    /// Sandbox gateway for development builds.
    #[default]
    Development,
    /// Production gateway.
    Production,
}

impl GatewayEnvironment {
    /// Hostname for this environment.
    pub fn host(self) -> &'static str {
        match self {
            Self::Development => DEVELOPMENT_HOST,
            Self::Production => PRODUCTION_HOST,
        }
    }

    /// Parse `development`/`sandbox` or `production`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "sandbox" => Some(Self::Development),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Gateway connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Environment that selects the default host.
    pub environment: GatewayEnvironment,
    /// Explicit host, overriding the environment's host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Gateway port (443, or 2197 where 443 is blocked).
    pub port: u16,
    /// Per-request timeout enforced by the gateway client.
    pub request_timeout_ms: u64,
    /// Upper bound on closing a client after a dispatch.
    pub close_timeout_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            environment: GatewayEnvironment::Development,
            host: None,
            port: DEFAULT_PORT,
            request_timeout_ms: 30_000,
            close_timeout_ms: 5_000,
        }
    }
}

impl GatewaySettings {
    /// Resolve the configured endpoint.
    pub fn endpoint(&self) -> Endpoint {
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| self.environment.host().to_string());
        Endpoint::new(host, self.port)
    }
}

/// Default credential locations.
///
/// Only paths and identifiers live here; key material is read at send time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialSettings {
    /// PEM client certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_path: Option<PathBuf>,
    /// PEM private key for the certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    /// PKCS#12 archive holding certificate and key together.
    #[serde(rename = "certificateP12Path", skip_serializing_if = "Option::is_none")]
    pub certificate_p12_path: Option<PathBuf>,
    /// Name of the environment variable holding the private key or archive
    /// passphrase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_passphrase_env: Option<String>,
    /// `.p8` signing key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key_path: Option<PathBuf>,
    /// Signing key id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Developer team id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

/// Defaults for composed notifications.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComposeSettings {
    /// Default topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Default priority.
    pub priority: DeliveryPriority,
    /// Default push type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_type: Option<String>,
}

/// Dispatch scheduler settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerSettings {
    /// Maximum number of queued dispatches.
    pub queue_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (an `EnvFilter` directive).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}
