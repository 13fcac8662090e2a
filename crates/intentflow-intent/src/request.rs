//! Inbound request shape and validation.
//!
//! Validation runs at the boundary, before any stage is invoked.  A rejected
//! request never reaches the completion endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{IntentError, Result};

/// Maximum description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Prefix of every validation failure message returned to callers.
pub const VALIDATION_PREFIX: &str = "参数校验失败: ";

/// Body of a full generate request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Caller-supplied correlation id.  Blank means "generate one".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl WorkflowRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_description(&self.description)
    }
}

/// Reject blank descriptions and descriptions over
/// [`MAX_DESCRIPTION_CHARS`] characters.
pub fn validate_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(IntentError::InvalidRequest {
            reason: "描述不能为空".into(),
        });
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(IntentError::InvalidRequest {
            reason: format!("描述长度不能超过{MAX_DESCRIPTION_CHARS}字符"),
        });
    }
    Ok(())
}

/// Caller-facing message for a rejected request.
pub fn validation_message(reason: &str) -> String {
    format!("{VALIDATION_PREFIX}{reason}")
}
