//! Model-facing core of intentflow.
//!
//! This crate owns everything that talks to, or reads the output of, the
//! language model: the completion gateway, lenient reply normalization, and
//! the plan decomposer.  Intent classification and request orchestration
//! live in `intentflow-intent` and build on these pieces.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  prompt   ┌────────────────────┐
//! │   Planner   │──────────>│ CompletionGateway  │──> chat/completions
//! │ (decompose) │<──────────│   (LlmClient)      │
//! └──────┬──────┘  reply    └────────────────────┘
//!        │
//!        └──> reply::strip_code_fences ──> tree readers / scan
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- Completion gateway trait, HTTP client and wire types.
//! - [`reply`] -- Fence stripping, lenient field readers, string scanning.
//! - [`planner`] -- Workflow decomposition into variables and steps.
//! - [`outcome`] -- Fail-open stage results.
//! - [`config`] -- Layered service configuration.
//! - [`error`] -- Agent error types.

pub mod config;
pub mod error;
pub mod llm;
pub mod outcome;
pub mod planner;
pub mod reply;

// Re-export the most commonly used types at the crate root.
pub use config::ServiceConfig;
pub use error::{AgentError, Result};
pub use llm::{ChatRequest, CompletionGateway, LlmClient, LlmClientConfig, Message, Role};
pub use outcome::{StageFailure, StageOutcome};
pub use planner::{Plan, Planner, PlannerConfig, Step, Variable};
pub use reply::ParamValue;
