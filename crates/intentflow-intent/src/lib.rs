//! Intent classification and request orchestration for intentflow.
//!
//! This crate provides:
//!
//! - **Intent classification**: a gated yes/no verdict on whether text
//!   describes an automatable workflow, via [`classifier::Classifier`].
//! - **Orchestration**: classify, then decompose on a positive verdict, via
//!   [`pipeline::Pipeline`].
//! - **Envelopes**: the uniform success/error wrapper every result leaves in,
//!   [`envelope::ResponseEnvelope`].
//! - **Request validation**: [`request::validate_description`].

pub mod classifier;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod request;

pub use classifier::{Classifier, IntentVerdict};
pub use envelope::ResponseEnvelope;
pub use error::{IntentError, Result};
pub use pipeline::{GenerateResult, Pipeline};
pub use request::{WorkflowRequest, validate_description};
