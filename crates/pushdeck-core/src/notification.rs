//! Push notification model.
//!
//! A [`Notification`] is composed by the presentation layer and handed to a
//! dispatch task by value. Dispatch only ever borrows it immutably.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::NotificationError;

/// Maximum payload size the gateway accepts for regular notifications.
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// Delivery priority requested from the gateway.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryPriority {
    /// Deliver right away (`apns-priority: 10`).
    #[default]
    Immediate,
    /// Deliver at a time that conserves device power (`apns-priority: 5`).
    ConservePower,
}

impl DeliveryPriority {
    /// Value for the `apns-priority` request header.
    pub fn header_value(self) -> &'static str {
        match self {
            Self::Immediate => "10",
            Self::ConservePower => "5",
        }
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::ConservePower => "conserve-power",
        }
    }
}

impl fmt::Display for DeliveryPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" | "high" | "10" => Ok(Self::Immediate),
            "conserve-power" | "conserve_power" | "normal" | "5" => Ok(Self::ConservePower),
            other => Err(format!(
                "unknown priority {other:?} (expected immediate or conserve-power)"
            )),
        }
    }
}

/// A fully composed push notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Sanitized hex device token.
    pub token: String,
    /// Application topic (usually the bundle identifier).
    pub topic: String,
    /// Serialized JSON payload.
    pub payload: String,
    /// Key used by the gateway to coalesce superseding notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_id: Option<String>,
    /// Delivery priority.
    #[serde(default)]
    pub priority: DeliveryPriority,
    /// Instant after which the gateway should stop trying to deliver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Value for the `apns-push-type` header (e.g. `alert`, `background`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_type: Option<String>,
    /// Caller-chosen notification id. The client assigns one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apns_id: Option<Uuid>,
}

impl Notification {
    /// Create an immediate-priority notification with no optional headers.
    pub fn new(
        token: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            topic: topic.into(),
            payload: payload.into(),
            collapse_id: None,
            priority: DeliveryPriority::Immediate,
            expiration: None,
            push_type: None,
            apns_id: None,
        }
    }

    /// Set the collapse identifier.
    #[must_use]
    pub fn with_collapse_id(mut self, collapse_id: impl Into<String>) -> Self {
        self.collapse_id = Some(collapse_id.into());
        self
    }

    /// Set the delivery priority.
    #[must_use]
    pub fn with_priority(mut self, priority: DeliveryPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the expiration instant.
    #[must_use]
    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Set the push type.
    #[must_use]
    pub fn with_push_type(mut self, push_type: impl Into<String>) -> Self {
        self.push_type = Some(push_type.into());
        self
    }

    /// Pin the notification id instead of letting the client assign one.
    #[must_use]
    pub fn with_apns_id(mut self, apns_id: Uuid) -> Self {
        self.apns_id = Some(apns_id);
        self
    }

    /// Check the invariants required before dispatch.
    ///
    /// Token and topic must be non-empty, the token must be hex, and the
    /// payload must be a JSON object that fits within [`MAX_PAYLOAD_BYTES`].
    pub fn validate(&self) -> Result<(), NotificationError> {
        if self.token.is_empty() {
            return Err(NotificationError::EmptyToken);
        }
        if let Some(c) = self.token.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(NotificationError::InvalidToken(c));
        }
        if self.topic.trim().is_empty() {
            return Err(NotificationError::EmptyTopic);
        }
        if self.payload.len() > MAX_PAYLOAD_BYTES {
            return Err(NotificationError::PayloadTooLarge {
                size: self.payload.len(),
                limit: MAX_PAYLOAD_BYTES,
            });
        }
        match serde_json::from_str::<serde_json::Value>(&self.payload) {
            Ok(serde_json::Value::Object(_)) => Ok(()),
            Ok(_) => Err(NotificationError::PayloadNotJson(
                "expected a JSON object".into(),
            )),
            Err(e) => Err(NotificationError::PayloadNotJson(e.to_string())),
        }
    }

    /// Shorthand for `validate().is_ok()`.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Strip everything but hex digits from a pasted device token.
///
/// Tokens copied from device logs often arrive as `<375c78f0 411c3246 ...>`.
pub fn sanitize_token(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
