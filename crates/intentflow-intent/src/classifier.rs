//! Intent classifier -- decides whether text describes an automatable workflow.
//!
//! The model is asked for a yes/no claim plus a confidence score.  The claim
//! only survives if the confidence reaches the configured threshold:
//!
//! ```text
//! is_intent = raw_claim && confidence >= threshold
//! ```
//!
//! Classification never fails.  Gateway failures and unreadable replies both
//! produce a negative, zero-confidence verdict whose `category` tells them
//! apart (`"error"` vs `"parse-error"`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use intentflow_agent::reply::{bool_or, f64_or, strip_code_fences, text_or};
use intentflow_agent::{CompletionGateway, StageFailure, StageOutcome};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Category of a verdict produced because the gateway failed.
pub const CATEGORY_UPSTREAM_ERROR: &str = "error";

/// Category of a verdict produced because the reply could not be read.
pub const CATEGORY_PARSE_ERROR: &str = "parse-error";

/// The classifier's decision for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentVerdict {
    /// Gated result: the raw claim AND `confidence >= threshold`.
    pub is_intent: bool,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
    pub category: String,
    pub rationale: String,
    pub correlation_id: String,
    pub produced_at: DateTime<Utc>,
}

impl IntentVerdict {
    fn negative(correlation_id: &str, category: &str, rationale: String) -> Self {
        Self {
            is_intent: false,
            confidence: 0.0,
            category: category.to_owned(),
            rationale,
            correlation_id: correlation_id.to_owned(),
            produced_at: Utc::now(),
        }
    }

    /// Verdict returned when the gateway call failed.
    pub fn upstream_failure(correlation_id: &str, detail: &str) -> Self {
        Self::negative(
            correlation_id,
            CATEGORY_UPSTREAM_ERROR,
            format!("意图识别过程中发生错误: {detail}"),
        )
    }

    /// Verdict returned when the reply could not be parsed.
    pub fn parse_failure(correlation_id: &str, detail: &str) -> Self {
        Self::negative(
            correlation_id,
            CATEGORY_PARSE_ERROR,
            format!("JSON解析失败: {detail}"),
        )
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

const CLASSIFICATION_PROMPT: &str = r#"你是一名意图识别助手，负责判断用户的自然语言描述是否在要求生成一个工作流。

属于工作流生成意图的描述通常：
1. 描述了需要按顺序执行的一系列操作
2. 含有条件判断或循环等控制结构
3. 涉及变量、状态监测或自动化控制
4. 描述了业务流程、操作流程或控制流程

不属于工作流生成意图的描述通常是：简单问答或咨询、单条操作指令、信息查询、闲聊。

用户输入："{{userInput}}"

只返回如下结构的 JSON：
{
    "isWorkflowIntent": true 或 false,
    "confidence": 0.0 到 1.0 之间的数值,
    "intentCategory": "工作流生成" 或 "其他",
    "reason": "判断依据"
}

confidence 表示判断的把握程度；只有 confidence >= {{threshold}} 时才视为明确的工作流生成意图。"#;

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// The intent classifier.
pub struct Classifier {
    /// Minimum confidence for a positive verdict (inclusive).
    confidence_threshold: f64,
    gateway: Arc<dyn CompletionGateway>,
}

impl Classifier {
    /// Create a classifier with the given confidence threshold.
    pub fn new(confidence_threshold: f64, gateway: Arc<dyn CompletionGateway>) -> Self {
        Self {
            confidence_threshold,
            gateway,
        }
    }

    /// Classify `user_text`.
    pub async fn classify(&self, user_text: &str, correlation_id: &str) -> StageOutcome<IntentVerdict> {
        info!(correlation_id, user_text, "starting intent classification");

        let prompt = self.build_prompt(user_text);
        let reply = match self.gateway.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(correlation_id, error = %e, "intent classification failed");
                let verdict = IntentVerdict::upstream_failure(correlation_id, &e.to_string());
                return StageOutcome::degraded(verdict, e);
            }
        };
        debug!(correlation_id, reply = %reply, "model reply");

        let outcome = self.parse_verdict(&reply, correlation_id);
        let verdict = outcome.value();
        info!(
            correlation_id,
            is_intent = verdict.is_intent,
            confidence = verdict.confidence,
            category = %verdict.category,
            "intent classification finished"
        );
        outcome
    }

    /// Substitute the text and threshold into the prompt template.
    pub fn build_prompt(&self, user_text: &str) -> String {
        CLASSIFICATION_PROMPT
            .replace("{{threshold}}", &self.confidence_threshold.to_string())
            .replace("{{userInput}}", user_text)
    }

    /// Read a model reply into a gated verdict.
    pub fn parse_verdict(&self, reply: &str, correlation_id: &str) -> StageOutcome<IntentVerdict> {
        let body = strip_code_fences(reply);

        let tree = match serde_json::from_str::<Value>(body) {
            Ok(tree) if tree.is_object() => tree,
            Ok(_) => return self.unreadable(correlation_id, reply, "expected a JSON object".into()),
            Err(e) => return self.unreadable(correlation_id, reply, e.to_string()),
        };

        let raw_claim = bool_or(&tree, "isWorkflowIntent", false);
        let confidence = clamp_confidence(f64_or(&tree, "confidence", 0.0));
        let is_intent = raw_claim && confidence >= self.confidence_threshold;

        debug!(
            correlation_id,
            raw_claim,
            confidence,
            threshold = self.confidence_threshold,
            is_intent,
            "gating applied"
        );

        StageOutcome::Completed(IntentVerdict {
            is_intent,
            confidence,
            category: text_or(&tree, "intentCategory", "未知"),
            rationale: text_or(&tree, "reason", "无法获取判断理由"),
            correlation_id: correlation_id.to_owned(),
            produced_at: Utc::now(),
        })
    }

    fn unreadable(&self, correlation_id: &str, reply: &str, reason: String) -> StageOutcome<IntentVerdict> {
        warn!(correlation_id, error = %reason, "intent reply is not a JSON object");
        debug!(correlation_id, reply = %reply, "unreadable intent reply");
        StageOutcome::degraded(
            IntentVerdict::parse_failure(correlation_id, &reason),
            StageFailure::Unparseable { reason },
        )
    }
}

/// Clamp into `[0, 1]`; NaN becomes 0.
fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
