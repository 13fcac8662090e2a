//! HTTP interface for intentflow.
//!
//! This crate exposes the classify-then-decompose pipeline over a small REST
//! API.  Every response body is a `ResponseEnvelope` and the HTTP status
//! always equals the envelope's `code`.
//!
//! - `/api/workflow/*` -- generate, intent, decompose, health, info.
//! - `/api/test/*` -- ping and service status.

pub mod api;
pub mod server;
pub mod state;

pub use server::WebServer;
pub use state::AppState;

use intentflow_agent::config::ServerSettings;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        ServerSettings::default().into()
    }
}

impl From<ServerSettings> for WebConfig {
    fn from(settings: ServerSettings) -> Self {
        Self {
            bind_addr: settings.bind_addr,
            port: settings.port,
        }
    }
}
