//! Tracing subscriber installation
//!
//! `RUST_LOG` takes precedence; otherwise the configured level is used as
//! the filter directive. Output goes to stderr, human-readable or JSON lines.

use propdesk_domain::{LoggingConfig, PropDeskError, Result};
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

const FALLBACK_DIRECTIVE: &str = "info";

/// Filter from `RUST_LOG`, then `config.level`, then `info`.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    resolve_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), &config.level)
}

fn resolve_filter(env_directive: Option<&str>, level: &str) -> EnvFilter {
    env_directive
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_DIRECTIVE))
}

/// Install the global subscriber.
///
/// Safe to call more than once: later calls leave the first subscriber in
/// place and return an error describing why.
///
/// # Errors
/// Returns `PropDeskError::Internal` if a global subscriber is already set
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let builder = fmt()
        .with_env_filter(build_filter(config))
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.compact().try_init()
    };

    installed.map_err(|e| PropDeskError::Internal(format!("tracing already initialised: {e}")))
}
