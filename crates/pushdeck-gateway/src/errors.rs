//! Gateway client error types.

use thiserror::Error;

/// Failure constructing a client. Raised before any connection exists.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No server address was configured.
    #[error("no gateway server configured")]
    MissingServer,
    /// Neither client credentials nor a signing key were configured.
    #[error("no client credentials or signing key configured")]
    MissingCredentials,
    /// The certificate and key could not be turned into a TLS identity.
    #[error("invalid client identity: {reason}")]
    Identity {
        /// Error description.
        reason: String,
    },
    /// The certificate's private key could not be read or decrypted.
    #[error("invalid private key: {reason}")]
    PrivateKey {
        /// Error description.
        reason: String,
    },
    /// The PKCS#12 archive could not be opened or holds no key.
    #[error("invalid PKCS#12 archive: {reason}")]
    Pkcs12 {
        /// Error description.
        reason: String,
    },
    /// The signing key could not be parsed.
    #[error("invalid signing key: {reason}")]
    SigningKey {
        /// Error description.
        reason: String,
    },
    /// The HTTP client (TLS context, connection pool) could not be built.
    #[error("failed to build HTTP client")]
    Transport(#[source] reqwest::Error),
}

/// Failure while a notification is in flight, or on close.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection, TLS, protocol, or timeout failure.
    #[error("gateway request failed")]
    Transport(#[from] reqwest::Error),
    /// Low-level I/O failure.
    #[error("gateway I/O failed")]
    Io(#[from] std::io::Error),
    /// A bearer token could not be signed.
    #[error("failed to sign bearer token: {reason}")]
    Signing {
        /// Error description.
        reason: String,
    },
    /// The gateway answered with something other than a rejection body.
    #[error("malformed gateway response (HTTP {status}): {body}")]
    MalformedResponse {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The client was already closed.
    #[error("gateway client is closed")]
    Closed,
}
