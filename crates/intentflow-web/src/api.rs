//! REST API route handlers.
//!
//! Every handler answers with `(status, Json<ResponseEnvelope<_>>)` where the
//! status is derived from the envelope code.  Extractor rejections (bad JSON
//! body, missing query parameter) are turned into 400 envelopes here so the
//! caller never sees axum's plain-text errors.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use intentflow_agent::Plan;
use intentflow_intent::envelope::CODE_BAD_REQUEST;
use intentflow_intent::request::validation_message;
use intentflow_intent::{GenerateResult, IntentVerdict, ResponseEnvelope, WorkflowRequest};

use crate::state::AppState;

/// Handler return type.
pub type ApiResponse<T> = (StatusCode, Json<ResponseEnvelope<T>>);

/// Map an envelope to its HTTP response.
pub fn respond<T: Serialize>(envelope: ResponseEnvelope<T>) -> ApiResponse<T> {
    let status = StatusCode::from_u16(envelope.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope))
}

fn rejected<T: Serialize>(detail: String) -> ApiResponse<T> {
    warn!(detail = %detail, "request rejected by extractor");
    respond(ResponseEnvelope::error(CODE_BAD_REQUEST, validation_message(&detail)))
}

/// Query string of the single-stage endpoints.
#[derive(Debug, Deserialize)]
pub struct DescriptionQuery {
    pub description: String,
}

// ---------------------------------------------------------------------------
// POST /api/workflow/generate
// ---------------------------------------------------------------------------

/// Full pipeline: classify, then decompose on a positive verdict.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WorkflowRequest>, JsonRejection>,
) -> ApiResponse<GenerateResult> {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return rejected(rejection.body_text()),
    };
    info!(
        user_id = ?request.user_id,
        request_id = ?request.request_id,
        "workflow generation request received"
    );
    respond(state.pipeline.generate(&request).await)
}

// ---------------------------------------------------------------------------
// POST /api/workflow/intent
// ---------------------------------------------------------------------------

/// Classification only.
pub async fn intent(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DescriptionQuery>, QueryRejection>,
) -> ApiResponse<IntentVerdict> {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return rejected(rejection.body_text()),
    };
    info!("intent request received");
    respond(state.pipeline.classify_only(&query.description).await)
}

// ---------------------------------------------------------------------------
// POST /api/workflow/decompose
// ---------------------------------------------------------------------------

/// Decomposition only, skipping classification.
pub async fn decompose(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DescriptionQuery>, QueryRejection>,
) -> ApiResponse<Plan> {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return rejected(rejection.body_text()),
    };
    info!("decompose request received");
    respond(state.pipeline.decompose_only(&query.description).await)
}

// ---------------------------------------------------------------------------
// GET /api/workflow/health, GET /api/workflow/info
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResponse<String> {
    debug!("health check");
    respond(state.pipeline.health())
}

const API_INFO: &str = "\
工作流生成服务 API 说明：

1. POST /api/workflow/generate
   - 完整流程：先意图识别，再任务分解
   - 请求体：{\"description\": \"...\", \"userId\": \"...\", \"requestId\": \"...\"}
   - 不是工作流意图时返回意图识别结果，否则返回任务分解结果

2. POST /api/workflow/intent?description=用户描述
   - 仅进行意图识别

3. POST /api/workflow/decompose?description=用户描述
   - 仅进行任务分解（跳过意图识别）

4. GET /api/workflow/health
   - 健康检查

5. GET /api/workflow/info
   - 本说明

注意事项：
- 所有接口都返回统一的响应信封：code、message、data、correlationId、timestamp
- 描述不能为空，长度限制为2000字符
- 需要配置 DEEPSEEK_API_KEY 环境变量
";

pub async fn info() -> ApiResponse<String> {
    respond(ResponseEnvelope::success(API_INFO.to_owned()))
}

// ---------------------------------------------------------------------------
// GET /api/test/ping, GET /api/test/status
// ---------------------------------------------------------------------------

pub async fn ping() -> ApiResponse<String> {
    respond(ResponseEnvelope::success("pong".to_owned()))
}

/// Payload of `/api/test/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service: &'static str,
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
    pub uptime_seconds: i64,
    pub gateway_configured: bool,
}

pub async fn status(State(state): State<Arc<AppState>>) -> ApiResponse<ServiceStatus> {
    let now = Utc::now();
    respond(ResponseEnvelope::success(ServiceStatus {
        service: "intentflow",
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now,
        uptime_seconds: (now - state.started_at).num_seconds(),
        gateway_configured: state.gateway_configured,
    }))
}
