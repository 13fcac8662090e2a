//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, configuration loading and envelope
//! printing.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use intentflow_agent::ServiceConfig;
use intentflow_intent::ResponseEnvelope;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// `RUST_LOG` takes precedence over `default_level`.  Logs go to stderr so
/// one-shot commands can pipe their JSON output.
pub fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Load `.env`, then the optional TOML file, then environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => debug!(error = %e, "no .env loaded"),
    }

    load_config_with(path, |key| std::env::var(key).ok())
}

/// Load the optional TOML file with overrides taken from `lookup`.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    ServiceConfig::load_with(path, lookup).with_context(|| match path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration".to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Render an envelope as pretty JSON.
pub fn render_envelope<T: Serialize>(envelope: &ResponseEnvelope<T>) -> Result<String> {
    serde_json::to_string_pretty(envelope).context("failed to serialize response")
}

/// Print an envelope to stdout and return whether it reports success.
pub fn print_envelope<T: Serialize>(envelope: &ResponseEnvelope<T>) -> Result<bool> {
    println!("{}", render_envelope(envelope)?);
    Ok(envelope.is_success())
}
