//! # pushdeck-settings
//!
//! Layered configuration for the pushdeck console.
//!
//! Settings are resolved from compiled defaults, then
//! `~/.pushdeck/settings.json`, then `PUSHDECK_*` environment variables.
//! Call [`load_settings`] once at startup and pass the result down.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{
    ComposeSettings, ConsoleSettings, CredentialSettings, GatewayEnvironment, GatewaySettings,
    LoggingSettings, SchedulerSettings,
};
