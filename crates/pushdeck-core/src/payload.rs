//! Simple alert payload builder.
//!
//! Produces the JSON body for a plain alert notification so the console can
//! send something without the user writing raw JSON.

use std::collections::BTreeMap;

use serde_json::{Value, json};

/// Builder for `{"aps": {"alert": {...}}}` payloads.
#[derive(Clone, Debug, Default)]
pub struct AlertPayloadBuilder {
    title: Option<String>,
    body: Option<String>,
    sound: Option<String>,
    badge: Option<u32>,
    thread_id: Option<String>,
    custom: BTreeMap<String, Value>,
}

impl AlertPayloadBuilder {
    /// Start an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alert title.
    #[must_use]
    pub fn alert_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Alert body.
    #[must_use]
    pub fn alert_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sound name (e.g. `default`).
    #[must_use]
    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    /// Badge count.
    #[must_use]
    pub fn badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    /// Thread id for notification grouping.
    #[must_use]
    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Custom key placed at the payload root, next to `aps`.
    #[must_use]
    pub fn custom(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self.custom.insert(key.into(), value);
        self
    }

    /// Build the payload as a JSON value.
    pub fn to_value(&self) -> Value {
        let mut alert = serde_json::Map::new();
        if let Some(ref title) = self.title {
            let _ = alert.insert("title".into(), json!(title));
        }
        if let Some(ref body) = self.body {
            let _ = alert.insert("body".into(), json!(body));
        }

        let mut aps = serde_json::Map::new();
        if !alert.is_empty() {
            let _ = aps.insert("alert".into(), Value::Object(alert));
        }
        if let Some(ref sound) = self.sound {
            let _ = aps.insert("sound".into(), json!(sound));
        }
        if let Some(badge) = self.badge {
            let _ = aps.insert("badge".into(), json!(badge));
        }
        if let Some(ref thread_id) = self.thread_id {
            let _ = aps.insert("thread-id".into(), json!(thread_id));
        }

        let mut root = serde_json::Map::new();
        let _ = root.insert("aps".into(), Value::Object(aps));
        for (key, value) in &self.custom {
            if key != "aps" {
                let _ = root.insert(key.clone(), value.clone());
            }
        }
        Value::Object(root)
    }

    /// Build the payload as a compact JSON string.
    pub fn build(&self) -> String {
        self.to_value().to_string()
    }
}
