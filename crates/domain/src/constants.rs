//! Application constants
//!
//! Centralized location for domain-level defaults used by configuration and
//! the session layer.

// Session synchronization
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
pub const DEFAULT_PROFILE_TIMEOUT_MS: u64 = 8_000;

// Backend access
pub const DEFAULT_PROFILES_TABLE: &str = "profiles";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_ATTEMPTS: usize = 2;

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
