//! The gateway client seam and its HTTP/2 implementation.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use pushdeck_core::Notification;
use pushdeck_core::text::token_prefix;
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::GatewayError;
use crate::token::TokenSigner;
use crate::types::{GatewayResponse, RejectionBody};

/// An asynchronous connection to the gateway.
///
/// A client owns its connection pool exclusively. Callers must `close` it
/// when done; `close` is idempotent and any send after it fails with
/// [`GatewayError::Closed`].
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Send one notification and wait for the gateway's answer.
    async fn send_notification(
        &self,
        notification: &Notification,
    ) -> Result<GatewayResponse, GatewayError>;

    /// Release connection resources.
    async fn close(&self) -> Result<(), GatewayError>;
}

/// HTTP/2 gateway client built by [`crate::GatewayClientBuilder`].
pub struct ApnsClient {
    base_url: String,
    http: Mutex<Option<reqwest::Client>>,
    signer: Option<TokenSigner>,
}

impl std::fmt::Debug for ApnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApnsClient")
            .field("base_url", &self.base_url)
            .field("token_auth", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ApnsClient {
    pub(crate) fn new(base_url: String, http: reqwest::Client, signer: Option<TokenSigner>) -> Self {
        Self {
            base_url,
            http: Mutex::new(Some(http)),
            signer,
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True once [`GatewayClient::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn http(&self) -> Result<reqwest::Client, GatewayError> {
        self.http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GatewayError::Closed)
    }

    fn build_request(
        &self,
        http: &reqwest::Client,
        notification: &Notification,
        apns_id: Uuid,
    ) -> Result<reqwest::RequestBuilder, GatewayError> {
        let url = format!("{}/3/device/{}", self.base_url, notification.token);

        let mut request = http
            .post(url)
            .header("content-type", "application/json")
            .header("apns-topic", &notification.topic)
            .header("apns-priority", notification.priority.header_value())
            .header("apns-id", apns_id.to_string());

        if let Some(ref push_type) = notification.push_type {
            request = request.header("apns-push-type", push_type);
        }
        if let Some(expiration) = notification.expiration {
            request = request.header("apns-expiration", expiration.timestamp().to_string());
        }
        if let Some(ref collapse_id) = notification.collapse_id {
            request = request.header("apns-collapse-id", collapse_id);
        }
        if let Some(ref signer) = self.signer {
            request = request.header("authorization", format!("bearer {}", signer.bearer()?));
        }

        Ok(request.body(notification.payload.clone()))
    }
}

#[async_trait]
impl GatewayClient for ApnsClient {
    async fn send_notification(
        &self,
        notification: &Notification,
    ) -> Result<GatewayResponse, GatewayError> {
        let http = self.http()?;
        let apns_id = notification.apns_id.unwrap_or_else(Uuid::now_v7);
        let request = self.build_request(&http, notification, apns_id)?;

        debug!(
            token_len = notification.token.len(),
            token_prefix = token_prefix(&notification.token),
            topic = %notification.topic,
            priority = notification.priority.header_value(),
            %apns_id,
            "gateway request"
        );

        let response = request.send().await?;
        let status = response.status();
        let returned_id = response
            .headers()
            .get("apns-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or(apns_id);

        if status == StatusCode::OK {
            info!(status = status.as_u16(), apns_id = %returned_id, "gateway accepted");
            return Ok(GatewayResponse::accepted(returned_id));
        }

        let body = response.text().await?;
        match serde_json::from_str::<RejectionBody>(&body) {
            Ok(rejection) => {
                let invalidated_at = rejection.invalidated_at();
                if let Some(reason) = rejection.reason {
                    warn!(
                        status = status.as_u16(),
                        reason = %reason,
                        token_prefix = token_prefix(&notification.token),
                        "gateway rejected"
                    );
                    return Ok(GatewayResponse::rejected(returned_id, reason, invalidated_at));
                }
            }
            Err(e) => debug!(error = %e, "rejection body is not JSON"),
        }

        Err(GatewayError::MalformedResponse {
            status: status.as_u16(),
            body,
        })
    }

    async fn close(&self) -> Result<(), GatewayError> {
        let previous = self
            .http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            debug!(base_url = %self.base_url, "gateway client closed");
        }
        Ok(())
    }
}
