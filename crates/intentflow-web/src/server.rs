//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and starts
//! the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use intentflow_intent::Pipeline;

use crate::WebConfig;
use crate::api;
use crate::state::AppState;

/// The intentflow web server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server.
    ///
    /// # Arguments
    ///
    /// * `config` - Bind address and port configuration.
    /// * `pipeline` - The pipeline shared across all requests.
    /// * `gateway_configured` - Reported by `/api/test/status`.
    pub fn new(config: WebConfig, pipeline: Arc<Pipeline>, gateway_configured: bool) -> Self {
        let state = Arc::new(AppState::new(pipeline, gateway_configured));
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);

        Router::new()
            // Workflow API.
            .route("/api/workflow/generate", post(api::generate))
            .route("/api/workflow/intent", post(api::intent))
            .route("/api/workflow/decompose", post(api::decompose))
            .route("/api/workflow/health", get(api::health))
            .route("/api/workflow/info", get(api::info))
            // Diagnostics.
            .route("/api/test/ping", get(api::ping))
            .route("/api/test/status", get(api::status))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(
            addr = %addr,
            gateway_configured = self.state.gateway_configured,
            "starting web server"
        );

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
