//! Request orchestration: classify first, decompose only on a positive verdict.
//!
//! ```text
//! description ──> Classifier ──negative──> envelope(IntentVerdict)
//!                     │
//!                  positive
//!                     ▼
//!                  Planner ──────────────> envelope(Plan)
//! ```
//!
//! Both stages are fail-open, so a stage normally cannot make the pipeline
//! fail.  The only error envelopes produced here come from request
//! validation (400) and from the panic guard around the stages (500).

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use intentflow_agent::{CompletionGateway, Plan, Planner, PlannerConfig, ServiceConfig};

use crate::classifier::{Classifier, IntentVerdict};
use crate::envelope::{CODE_BAD_REQUEST, CODE_INTERNAL_ERROR, ResponseEnvelope};
use crate::error::{IntentError, Result};
use crate::request::{WorkflowRequest, validate_description, validation_message};

/// Message carried by the health envelope.
pub const HEALTH_MESSAGE: &str = "工作流生成服务运行正常";

/// Payload of a full pipeline run: the verdict when the text is not a
/// workflow request, the plan when it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerateResult {
    Intent(IntentVerdict),
    Plan(Plan),
}

/// The two-stage pipeline.
pub struct Pipeline {
    classifier: Classifier,
    planner: Planner,
}

impl Pipeline {
    pub fn new(classifier: Classifier, planner: Planner) -> Self {
        Self {
            classifier,
            planner,
        }
    }

    /// Build both stages over one shared gateway.
    pub fn from_config(config: &ServiceConfig, gateway: Arc<dyn CompletionGateway>) -> Self {
        let classifier = Classifier::new(config.intent.confidence_threshold, gateway.clone());
        let planner = Planner::new(gateway, PlannerConfig::from(config.decomposition.clone()));
        Self::new(classifier, planner)
    }

    /// Validate a full request, then run [`process`](Self::process).
    pub async fn generate(&self, request: &WorkflowRequest) -> ResponseEnvelope<GenerateResult> {
        if let Err(e) = request.validate() {
            return rejection(e);
        }
        info!(user_id = ?request.user_id, "workflow generation requested");
        self.process(&request.description, request.request_id.as_deref())
            .await
    }

    /// Classify `description` and, on a positive verdict, decompose it.
    ///
    /// A blank or absent `supplied_id` is replaced with a fresh id.
    pub async fn process(
        &self,
        description: &str,
        supplied_id: Option<&str>,
    ) -> ResponseEnvelope<GenerateResult> {
        let correlation_id = resolve_correlation_id(supplied_id);
        info!(correlation_id = %correlation_id, "processing workflow request");

        let result = guarded("generate", async {
            let verdict = self
                .classifier
                .classify(description, &correlation_id)
                .await
                .into_value();

            if !verdict.is_intent {
                info!(
                    correlation_id = %correlation_id,
                    category = %verdict.category,
                    "not a workflow intent, returning verdict"
                );
                return GenerateResult::Intent(verdict);
            }

            let plan = self
                .planner
                .decompose(description, &correlation_id)
                .await
                .into_value();
            GenerateResult::Plan(plan)
        })
        .await;

        match result {
            Ok(data) => {
                info!(correlation_id = %correlation_id, "workflow request finished");
                ResponseEnvelope::success_with_id(data, correlation_id)
            }
            Err(e) => {
                error!(correlation_id = %correlation_id, error = %e, "workflow request failed");
                ResponseEnvelope::error_with_id(
                    CODE_INTERNAL_ERROR,
                    format!("工作流生成失败: {e}"),
                    correlation_id,
                )
            }
        }
    }

    /// Run the classifier alone under a fresh correlation id.
    pub async fn classify_only(&self, description: &str) -> ResponseEnvelope<IntentVerdict> {
        if let Err(e) = validate_description(description) {
            return rejection(e);
        }
        let correlation_id = resolve_correlation_id(None);

        let result = guarded("classify", async {
            self.classifier
                .classify(description, &correlation_id)
                .await
                .into_value()
        })
        .await;

        match result {
            Ok(verdict) => ResponseEnvelope::success_with_id(verdict, correlation_id),
            Err(e) => {
                error!(correlation_id = %correlation_id, error = %e, "classification failed");
                ResponseEnvelope::error_with_id(
                    CODE_INTERNAL_ERROR,
                    format!("意图识别失败: {e}"),
                    correlation_id,
                )
            }
        }
    }

    /// Run the decomposer alone under a fresh correlation id.
    pub async fn decompose_only(&self, description: &str) -> ResponseEnvelope<Plan> {
        if let Err(e) = validate_description(description) {
            return rejection(e);
        }
        let correlation_id = resolve_correlation_id(None);

        let result = guarded("decompose", async {
            self.planner
                .decompose(description, &correlation_id)
                .await
                .into_value()
        })
        .await;

        match result {
            Ok(plan) => ResponseEnvelope::success_with_id(plan, correlation_id),
            Err(e) => {
                error!(correlation_id = %correlation_id, error = %e, "decomposition failed");
                ResponseEnvelope::error_with_id(
                    CODE_INTERNAL_ERROR,
                    format!("任务分解失败: {e}"),
                    correlation_id,
                )
            }
        }
    }

    pub fn health(&self) -> ResponseEnvelope<String> {
        ResponseEnvelope::success(HEALTH_MESSAGE.to_owned())
    }
}

/// Use the caller's id unchanged when it is non-blank, otherwise mint one.
pub fn resolve_correlation_id(supplied: Option<&str>) -> String {
    match supplied {
        Some(id) if !id.trim().is_empty() => id.to_owned(),
        _ => Uuid::now_v7().to_string(),
    }
}

/// 400 envelope for a request that failed validation.
pub fn rejection<T>(err: IntentError) -> ResponseEnvelope<T> {
    let reason = match err {
        IntentError::InvalidRequest { reason } => reason,
        other => other.to_string(),
    };
    warn!(reason = %reason, "request rejected");
    ResponseEnvelope::error(CODE_BAD_REQUEST, validation_message(&reason))
}

/// Run a stage future, converting a panic into [`IntentError::StageAborted`].
async fn guarded<T>(stage: &'static str, fut: impl Future<Output = T>) -> Result<T> {
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|payload| IntentError::StageAborted {
            stage,
            reason: panic_message(payload.as_ref()),
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
