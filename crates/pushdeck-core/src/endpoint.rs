//! Gateway endpoint addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::EndpointError;

/// Development (sandbox) gateway host.
pub const DEVELOPMENT_HOST: &str = "api.sandbox.push.apple.com";

/// Production gateway host.
pub const PRODUCTION_HOST: &str = "api.push.apple.com";

/// Default HTTPS port.
pub const DEFAULT_PORT: u16 = 443;

/// Alternate port for networks that block outbound 443.
pub const ALTERNATE_PORT: u16 = 2197;

/// A gateway server address, supplied per dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The development gateway on the default port.
    pub fn development() -> Self {
        Self::new(DEVELOPMENT_HOST, DEFAULT_PORT)
    }

    /// The production gateway on the default port.
    pub fn production() -> Self {
        Self::new(PRODUCTION_HOST, DEFAULT_PORT)
    }

    /// Check that the host is non-empty and the port is a usable TCP port.
    pub fn validate(&self) -> Result<(), EndpointError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        if host.chars().any(char::is_whitespace) {
            return Err(EndpointError::MalformedHost(self.host.clone()));
        }
        if self.port == 0 {
            return Err(EndpointError::InvalidPort(self.port));
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
