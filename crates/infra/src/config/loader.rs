//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file if one exists (values already in the environment
//!    win)
//! 2. Attempts to load from environment variables
//! 3. If the required variables are missing, falls back to a config file
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `PROPDESK_BACKEND_URL`: Backend base URL (required)
//! - `PROPDESK_BACKEND_ANON_KEY`: Public API key (required)
//! - `PROPDESK_PROFILES_TABLE`: Profile table name
//! - `PROPDESK_REQUEST_TIMEOUT_MS`: Per-request timeout in milliseconds
//! - `PROPDESK_MAX_ATTEMPTS`: Attempts per request (initial try + retries)
//! - `PROPDESK_SETTLE_DELAY_MS`: Navigation settling delay in milliseconds
//! - `PROPDESK_PROFILE_TIMEOUT_MS`: Profile read timeout in milliseconds
//! - `PROPDESK_LOG_LEVEL`: Fallback log filter when `RUST_LOG` is unset
//! - `PROPDESK_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! The loader probes `propdesk.{json,toml}` then `config.{json,toml}` in the
//! working directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use propdesk_domain::{
    BackendConfig, Config, LoggingConfig, PropDeskError, Result, SessionSyncConfig,
};
use url::Url;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `PropDeskError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Validation fails
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Reads `.env` first via `dotenvy`. Optional variables fall back to their
/// defaults.
///
/// # Errors
/// Returns `PropDeskError::Config` if required variables are missing, a
/// value cannot be parsed, or validation fails.
pub fn load_from_env() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let mut backend =
        BackendConfig::new(env_var("PROPDESK_BACKEND_URL")?, env_var("PROPDESK_BACKEND_ANON_KEY")?);
    if let Some(table) = env_opt("PROPDESK_PROFILES_TABLE") {
        backend.profiles_table = table;
    }
    if let Some(timeout) = env_parse("PROPDESK_REQUEST_TIMEOUT_MS")? {
        backend.request_timeout_ms = timeout;
    }
    if let Some(attempts) = env_parse("PROPDESK_MAX_ATTEMPTS")? {
        backend.max_attempts = attempts;
    }

    let mut session = SessionSyncConfig::default();
    if let Some(delay) = env_parse("PROPDESK_SETTLE_DELAY_MS")? {
        session.settle_delay_ms = delay;
    }
    if let Some(timeout) = env_parse("PROPDESK_PROFILE_TIMEOUT_MS")? {
        session.profile_timeout_ms = timeout;
    }

    let mut logging = LoggingConfig::default();
    if let Some(level) = env_opt("PROPDESK_LOG_LEVEL") {
        logging.level = level;
    }
    logging.json = env_bool("PROPDESK_LOG_JSON", logging.json);

    let config = Config { backend, session, logging };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations for a config file.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `PropDeskError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(PropDeskError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            PropDeskError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| PropDeskError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| PropDeskError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| PropDeskError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(PropDeskError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Domain validation plus a full URL parse of the backend endpoint.
fn validate(config: &Config) -> Result<()> {
    config.validate()?;
    Url::parse(config.backend.base_url()).map_err(|e| {
        PropDeskError::Config(format!("Invalid backend URL '{}': {e}", config.backend.url))
    })?;
    Ok(())
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["propdesk.json", "propdesk.toml", "config.json", "config.toml"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        PropDeskError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Get optional environment variable, treating blank values as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse optional numeric environment variable
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| PropDeskError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
