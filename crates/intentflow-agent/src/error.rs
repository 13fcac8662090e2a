//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.

/// Unified error type for the agent crate.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Completion gateway errors -------------------------------------------
    /// The gateway credential is missing, blank, or a placeholder.  Raised
    /// before any network call is attempted.
    #[error("completion endpoint unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    /// The HTTP request failed in transport or returned a non-success status.
    #[error("completion request failed: {reason}")]
    UpstreamError { reason: String },

    /// The endpoint answered with a success status but the envelope carried no
    /// usable choice.
    #[error("completion response malformed: {reason}")]
    UpstreamMalformed { reason: String },

    // -- Configuration errors -----------------------------------------------
    /// Configuration loading or validation failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamError {
            reason: err.to_string(),
        }
    }
}

impl AgentError {
    /// Whether this error originated at the completion gateway boundary.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. }
                | Self::UpstreamError { .. }
                | Self::UpstreamMalformed { .. }
        )
    }
}
