//! Fail-open stage results.
//!
//! Classification and decomposition never surface an error to their caller.
//! Instead they return a [`StageOutcome`]: the value is always usable, and a
//! degraded outcome additionally records why the stage fell back to it.  The
//! failure is for logging and tests; callers that only want the value use
//! [`StageOutcome::into_value`].

use crate::error::AgentError;

/// Why a stage fell back to a synthesized value.
#[derive(Debug, thiserror::Error)]
pub enum StageFailure {
    /// The completion gateway failed.
    #[error(transparent)]
    Upstream(#[from] AgentError),

    /// The model replied, but the reply was not the structure we asked for.
    #[error("model output unparseable: {reason}")]
    Unparseable { reason: String },
}

impl StageFailure {
    /// Short machine-readable label, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upstream(AgentError::UpstreamUnavailable { .. }) => "upstream_unavailable",
            Self::Upstream(AgentError::UpstreamMalformed { .. }) => "upstream_malformed",
            Self::Upstream(_) => "upstream_error",
            Self::Unparseable { .. } => "unparseable",
        }
    }
}

/// Result of a fail-open stage.
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// The stage completed from a well-formed reply.
    Completed(T),
    /// The stage fell back to a synthesized value.
    Degraded { value: T, failure: StageFailure },
}

impl<T> StageOutcome<T> {
    /// Build a degraded outcome.
    pub fn degraded(value: T, failure: impl Into<StageFailure>) -> Self {
        Self::Degraded {
            value,
            failure: failure.into(),
        }
    }

    /// The carried value, whichever way it was produced.
    pub fn value(&self) -> &T {
        match self {
            Self::Completed(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Consume the outcome and return the value.
    pub fn into_value(self) -> T {
        match self {
            Self::Completed(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// The failure, when degraded.
    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            Self::Completed(_) => None,
            Self::Degraded { failure, .. } => Some(failure),
        }
    }

    /// Whether the stage fell back.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}
