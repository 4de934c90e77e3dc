//! Gateway response types.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// The gateway's answer to one notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayResponse {
    /// Whether the gateway accepted the notification.
    pub accepted: bool,
    /// Id the gateway associated with the notification.
    pub apns_id: Uuid,
    /// Reason string for a rejection.
    pub rejection_reason: Option<String>,
    /// Instant the token stopped being valid, for `Unregistered` rejections.
    pub token_invalidation_timestamp: Option<DateTime<Utc>>,
}

impl GatewayResponse {
    /// An accepted response.
    pub fn accepted(apns_id: Uuid) -> Self {
        Self {
            accepted: true,
            apns_id,
            rejection_reason: None,
            token_invalidation_timestamp: None,
        }
    }

    /// A rejected response.
    pub fn rejected(
        apns_id: Uuid,
        reason: impl Into<String>,
        token_invalidation_timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            accepted: false,
            apns_id,
            rejection_reason: Some(reason.into()),
            token_invalidation_timestamp,
        }
    }
}

/// JSON body the gateway returns with a non-200 status.
#[derive(Debug, Deserialize)]
pub(crate) struct RejectionBody {
    pub reason: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: Option<i64>,
}

impl RejectionBody {
    pub(crate) fn invalidated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}
