//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  Nothing in it is mutated after startup; each request builds and
//! owns its own verdicts and plans.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use intentflow_intent::Pipeline;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// The classify-then-decompose pipeline.
    pub pipeline: Arc<Pipeline>,

    /// Whether the completion gateway holds a usable credential.
    pub gateway_configured: bool,

    /// When the server state was built.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, gateway_configured: bool) -> Self {
        Self {
            pipeline,
            gateway_configured,
            started_at: Utc::now(),
        }
    }
}
