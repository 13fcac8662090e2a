//! Intent engine error types.
//!
//! All intent subsystems surface errors through [`IntentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.

/// Unified error type for the intent engine.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    // -- Request errors -------------------------------------------------------
    /// The inbound request failed validation and never reached a stage.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    // -- Pipeline errors ------------------------------------------------------
    /// A stage panicked or otherwise escaped its own fallback handling.
    #[error("pipeline stage `{stage}` aborted: {reason}")]
    StageAborted { stage: &'static str, reason: String },
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
