//! # pushdeck-gateway
//!
//! Async client for the push notification gateway.
//!
//! - [`GatewayClientBuilder`] configures a server and exactly one
//!   authentication method (TLS client certificate or ES256 signing key)
//! - [`GatewayClient`] is the seam dispatch code talks to: one async send,
//!   one idempotent close
//! - [`ApnsClient`] speaks HTTP/2 via `reqwest`
//! - [`StubGatewayClient`] is a scriptable in-memory client for tests

#![deny(unsafe_code)]

pub mod builder;
pub mod client;
pub mod errors;
pub mod stub;
mod token;
pub mod types;

pub use builder::{GatewayClientBuilder, SigningKey};
pub use client::{ApnsClient, GatewayClient};
pub use errors::{BuildError, GatewayError};
pub use stub::{StubGatewayClient, StubRecorder, StubReply};
pub use types::GatewayResponse;
