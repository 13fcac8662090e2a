//! Uniform response wrapper.
//!
//! Every outward-facing result, success or failure, is a
//! [`ResponseEnvelope`].  `code == 200` means success; any other value is a
//! caller-visible failure category and doubles as the HTTP status.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Success code.
pub const CODE_OK: u16 = 200;
/// The request was rejected before reaching a stage.
pub const CODE_BAD_REQUEST: u16 = 400;
/// A stage failed in a way its own fallbacks did not cover.
pub const CODE_INTERNAL_ERROR: u16 = 500;

/// Message carried by every success envelope.
pub const SUCCESS_MESSAGE: &str = "成功";

/// Success-or-failure wrapper around a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<T> {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl<T> ResponseEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self::build(CODE_OK, SUCCESS_MESSAGE.into(), Some(data), None)
    }

    pub fn success_with_id(data: T, correlation_id: impl Into<String>) -> Self {
        Self::build(
            CODE_OK,
            SUCCESS_MESSAGE.into(),
            Some(data),
            Some(correlation_id.into()),
        )
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::build(code, message.into(), None, None)
    }

    pub fn error_with_id(
        code: u16,
        message: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self::build(code, message.into(), None, Some(correlation_id.into()))
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_OK
    }

    fn build(code: u16, message: String, data: Option<T>, correlation_id: Option<String>) -> Self {
        Self {
            code,
            message,
            data,
            correlation_id,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
