//! # pushdeck-core
//!
//! Foundation types for the pushdeck console.
//!
//! - **Notifications**: [`Notification`] with token, topic, payload, and the
//!   optional delivery headers (collapse id, priority, expiration, push type)
//! - **Credentials**: [`CredentialBundle`], a closed sum of certificate or
//!   signing-key authentication material
//! - **Endpoints**: [`Endpoint`] plus the well-known gateway hosts and ports
//! - **Readiness**: [`ReadinessGate`], the derived "may dispatch" flag
//! - **Logging**: subscriber bootstrap and log capture for tests

#![deny(unsafe_code)]

pub mod credentials;
pub mod endpoint;
pub mod errors;
pub mod logging;
pub mod notification;
pub mod payload;
pub mod readiness;
pub mod text;

pub use credentials::{
    CertificateCredential, CertificateMaterial, CredentialBundle, SigningKeyCredential,
};
pub use endpoint::Endpoint;
pub use errors::{CredentialLoadError, EndpointError, InvalidCredentialError, NotificationError};
pub use notification::{DeliveryPriority, Notification, sanitize_token};
pub use payload::AlertPayloadBuilder;
pub use readiness::{Blocker, Readiness, ReadinessGate};
