//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ConsoleSettings::default()`]
//! 2. If `~/.pushdeck/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Reject values no console can run with
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{ConsoleSettings, GatewayEnvironment};

/// Name of the directory under `$HOME` holding console state.
pub const SETTINGS_DIR: &str = ".pushdeck";

/// Resolve the path to the settings file (`~/.pushdeck/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(SETTINGS_DIR).join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ConsoleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or an unusable value, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<ConsoleSettings> {
    let mut settings = read_layers(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn read_layers(path: &Path) -> Result<ConsoleSettings> {
    let defaults = serde_json::to_value(ConsoleSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Check values that deserialize fine but cannot drive a console.
pub fn validate(settings: &ConsoleSettings) -> Result<()> {
    if settings.gateway.port == 0 {
        return Err(SettingsError::InvalidValue(
            "gateway.port must be between 1 and 65535".into(),
        ));
    }
    if settings.gateway.request_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "gateway.requestTimeoutMs must be at least 1".into(),
        ));
    }
    if settings.gateway.close_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "gateway.closeTimeoutMs must be at least 1".into(),
        ));
    }
    if settings.scheduler.queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "scheduler.queueCapacity must be at least 1".into(),
        ));
    }
    if settings
        .gateway
        .host
        .as_deref()
        .is_some_and(|h| h.trim().is_empty())
    {
        return Err(SettingsError::InvalidValue(
            "gateway.host must not be blank".into(),
        ));
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// - Integers must be valid and within the specified range
/// - Invalid values are ignored with a warning (fall back to file/default)
pub fn apply_env_overrides(settings: &mut ConsoleSettings) {
    // ── Gateway ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PUSHDECK_HOST") {
        settings.gateway.host = Some(v);
    }
    if let Some(v) = read_env_u16("PUSHDECK_PORT", 1, 65535) {
        settings.gateway.port = v;
    }
    if let Some(v) = read_env_environment("PUSHDECK_ENVIRONMENT") {
        settings.gateway.environment = v;
    }

    // ── Credentials ─────────────────────────────────────────────────
    if let Some(v) = read_env_string("PUSHDECK_KEY_ID") {
        settings.credentials.key_id = Some(v);
    }
    if let Some(v) = read_env_string("PUSHDECK_TEAM_ID") {
        settings.credentials.team_id = Some(v);
    }

    // ── Compose / scheduler / logging ───────────────────────────────
    if let Some(v) = read_env_string("PUSHDECK_TOPIC") {
        settings.compose.topic = Some(v);
    }
    if let Some(v) = read_env_usize("PUSHDECK_QUEUE_CAPACITY", 1, 65_536) {
        settings.scheduler.queue_capacity = v;
    }
    if let Some(v) = read_env_string("PUSHDECK_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_environment(name: &str) -> Option<GatewayEnvironment> {
    let val = std::env::var(name).ok()?;
    let result = GatewayEnvironment::parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "unknown gateway environment, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn deep_merge_nested_objects() {
        let target = json!({"gateway": {"port": 443, "closeTimeoutMs": 5000}});
        let source = json!({"gateway": {"port": 2197}});
        let result = deep_merge(target, source);
        assert_eq!(result["gateway"]["port"], 2197);
        assert_eq!(result["gateway"]["closeTimeoutMs"], 5000);
    }

    #[test]
    fn deep_merge_null_skipped() {
        let target = json!({"a": 1, "b": 2});
        let source = json!({"a": null, "b": 3});
        let result = deep_merge(target, source);
        assert_eq!(result["a"], 1);
        assert_eq!(result["b"], 3);
    }

    #[test]
    fn deep_merge_array_replaced() {
        let target = json!({"items": [1, 2, 3]});
        let source = json!({"items": [4, 5]});
        let result = deep_merge(target, source);
        assert_eq!(result["items"], json!([4, 5]));
    }

    #[test]
    fn deep_merge_new_keys_added() {
        let target = json!({"a": 1});
        let source = json!({"b": 2});
        let result = deep_merge(target, source);
        assert_eq!(result["a"], 1);
        assert_eq!(result["b"], 2);
    }

    #[test]
    fn deep_merge_object_over_primitive() {
        let result = deep_merge(json!({"a": 42}), json!({"a": {"nested": true}}));
        assert_eq!(result["a"]["nested"], true);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_uses_defaults() {
        let settings = read_layers(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.gateway.port, 443);
        assert_eq!(settings.scheduler.queue_capacity, 256);
    }

    #[test]
    fn load_partial_file_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "gateway": {"environment": "production", "port": 2197},
                "credentials": {"signingKeyPath": "/keys/AuthKey.p8", "keyId": "ABC123"},
                "compose": {"topic": "com.example.app", "priority": "conserve-power"}
            }"#,
        )
        .unwrap();

        let settings = read_layers(&path).unwrap();
        assert_eq!(settings.gateway.environment, GatewayEnvironment::Production);
        assert_eq!(settings.gateway.port, 2197);
        assert_eq!(settings.gateway.request_timeout_ms, 30_000);
        assert_eq!(
            settings.credentials.signing_key_path.as_deref(),
            Some(Path::new("/keys/AuthKey.p8"))
        );
        assert_eq!(settings.credentials.key_id.as_deref(), Some("ABC123"));
        assert_eq!(settings.compose.topic.as_deref(), Some("com.example.app"));
        assert_eq!(
            settings.compose.priority,
            pushdeck_core::DeliveryPriority::ConservePower
        );
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn load_invalid_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_layers(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_wrong_type_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"gateway": {"port": "four-four-three"}}"#).unwrap();
        assert!(matches!(read_layers(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_from_path_rejects_zero_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"scheduler": {"queueCapacity": 0}}"#).unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(ref m) if m.contains("queueCapacity")));
    }

    #[test]
    fn settings_path_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".pushdeck/settings.json"));
    }

    // ── validate ────────────────────────────────────────────────────

    #[test]
    fn validate_defaults_ok() {
        assert!(validate(&ConsoleSettings::default()).is_ok());
    }

    #[test]
    fn validate_rejects_blank_host() {
        let mut settings = ConsoleSettings::default();
        settings.gateway.host = Some("  ".into());
        assert!(matches!(
            validate(&settings),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let mut settings = ConsoleSettings::default();
        settings.gateway.close_timeout_ms = 0;
        assert!(validate(&settings).is_err());

        let mut settings = ConsoleSettings::default();
        settings.gateway.request_timeout_ms = 0;
        assert!(validate(&settings).is_err());
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_u16_range_bounds() {
        assert_eq!(parse_u16_range("443", 1, 65535), Some(443));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u16_range("abc", 1, 65535), None);
    }

    #[test]
    fn parse_usize_range_bounds() {
        assert_eq!(parse_usize_range("1", 1, 65_536), Some(1));
        assert_eq!(parse_usize_range("65536", 1, 65_536), Some(65_536));
        assert_eq!(parse_usize_range("65537", 1, 65_536), None);
        assert_eq!(parse_usize_range("-1", 1, 65_536), None);
    }
}
