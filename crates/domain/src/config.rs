//! Configuration structures
//!
//! Loaded by `propdesk-infra::config`; every field has a default except the
//! backend endpoint and key.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_ATTEMPTS, DEFAULT_PROFILES_TABLE, DEFAULT_PROFILE_TIMEOUT_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS,
};
use crate::{PropDeskError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionSyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        self.session.validate()
    }
}

/// Identity and profile backend endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://project.example.co`
    pub url: String,
    /// Public (anon) API key sent as the `apikey` header
    pub anon_key: String,
    #[serde(default = "default_profiles_table")]
    pub profiles_table: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Total attempts per request (initial try + retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            profiles_table: default_profiles_table(),
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PropDeskError::Config(format!(
                "backend url must be http(s), got '{}'",
                self.url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(PropDeskError::Config("backend anon key is empty".into()));
        }
        if self.profiles_table.trim().is_empty() {
            return Err(PropDeskError::Config("profiles table name is empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(PropDeskError::Config("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Timing knobs for the session coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSyncConfig {
    /// Delay before a navigation-triggered re-read, letting cookies settle
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Upper bound on a single profile read
    #[serde(default = "default_profile_timeout_ms")]
    pub profile_timeout_ms: u64,
}

impl SessionSyncConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_timeout_ms)
    }

    /// A zero profile timeout would fail every fetch before it starts.
    pub fn validate(&self) -> Result<()> {
        if self.profile_timeout_ms == 0 {
            return Err(PropDeskError::Config("profile_timeout_ms must be greater than 0".into()));
        }
        Ok(())
    }
}

impl Default for SessionSyncConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            profile_timeout_ms: default_profile_timeout_ms(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn default_profiles_table() -> String {
    DEFAULT_PROFILES_TABLE.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_profile_timeout_ms() -> u64 {
    DEFAULT_PROFILE_TIMEOUT_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
