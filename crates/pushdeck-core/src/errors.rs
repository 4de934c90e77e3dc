//! Validation error types for the core model.
//!
//! These are all local, synchronous failures raised before any network
//! resource exists.

use std::path::PathBuf;

use thiserror::Error;

/// A credential bundle that cannot be used to authenticate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidCredentialError {
    /// Neither a certificate pair nor a signing key was supplied.
    #[error("no credentials provided: supply a certificate and private key, or a signing key")]
    NoneProvided,
    /// Both a certificate pair and a signing key were supplied.
    #[error("ambiguous credentials: supply either a certificate pair or a signing key, not both")]
    Ambiguous,
    /// The certificate material is empty.
    #[error("certificate is empty")]
    EmptyCertificate,
    /// The private key paired with the certificate is empty.
    #[error("private key is empty")]
    EmptyPrivateKey,
    /// The signing key material is empty.
    #[error("signing key is empty")]
    EmptySigningKey,
    /// The signing key has no key identifier.
    #[error("signing key is missing its key id")]
    MissingKeyId,
    /// The signing key has no team identifier.
    #[error("signing key is missing its team id")]
    MissingTeamId,
}

/// Failure reading credential material from disk.
#[derive(Debug, Error)]
pub enum CredentialLoadError {
    /// The file could not be read.
    #[error("failed to read credential file {path}: {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file was read but the resulting credential is unusable.
    #[error(transparent)]
    Invalid(#[from] InvalidCredentialError),
}

/// A notification that must not be dispatched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    /// The device token is empty.
    #[error("device token is empty")]
    EmptyToken,
    /// The device token contains characters outside the hex alphabet.
    #[error("device token contains non-hex character {0:?}")]
    InvalidToken(char),
    /// The topic is empty.
    #[error("topic is empty")]
    EmptyTopic,
    /// The payload exceeds the gateway's size limit.
    #[error("payload is {size} bytes, limit is {limit}")]
    PayloadTooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Maximum accepted size in bytes.
        limit: usize,
    },
    /// The payload is not a serialized JSON object.
    #[error("payload is not a JSON object: {0}")]
    PayloadNotJson(String),
}

/// An endpoint that cannot be connected to.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The host is empty or blank.
    #[error("gateway host is empty")]
    EmptyHost,
    /// The host contains whitespace.
    #[error("gateway host {0:?} contains whitespace")]
    MalformedHost(String),
    /// The port is outside the usable TCP range.
    #[error("gateway port {0} is outside 1-65535")]
    InvalidPort(u16),
}
