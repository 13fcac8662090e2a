//! End-to-end tests for the classify-then-decompose pipeline.
//!
//! The gateway is replaced with in-memory doubles that answer the
//! classification and decomposition prompts differently and count calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use intentflow_agent::{AgentError, CompletionGateway, ServiceConfig};
use intentflow_intent::{GenerateResult, Pipeline, WorkflowRequest};

// ═══════════════════════════════════════════════════════════════════════
//  Gateway doubles
// ═══════════════════════════════════════════════════════════════════════

/// Answers by prompt kind and records how often each kind was asked.
struct Routed {
    intent_reply: String,
    plan_reply: String,
    intent_calls: AtomicUsize,
    plan_calls: AtomicUsize,
}

impl Routed {
    fn new(intent_reply: &str, plan_reply: &str) -> Arc<Self> {
        Arc::new(Self {
            intent_reply: intent_reply.to_owned(),
            plan_reply: plan_reply.to_owned(),
            intent_calls: AtomicUsize::new(0),
            plan_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionGateway for Routed {
    async fn complete(&self, prompt: &str) -> intentflow_agent::Result<String> {
        if prompt.contains("isWorkflowIntent") {
            self.intent_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.intent_reply.clone())
        } else {
            self.plan_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.plan_reply.clone())
        }
    }
}

/// Behaves like a client with no credential.
struct Unconfigured {
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionGateway for Unconfigured {
    async fn complete(&self, _prompt: &str) -> intentflow_agent::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AgentError::UpstreamUnavailable {
            reason: "API key is not configured; set DEEPSEEK_API_KEY".into(),
        })
    }
}

struct Panicking;

#[async_trait]
impl CompletionGateway for Panicking {
    async fn complete(&self, _prompt: &str) -> intentflow_agent::Result<String> {
        panic!("gateway bug")
    }
}

fn pipeline(gateway: Arc<dyn CompletionGateway>) -> Pipeline {
    Pipeline::from_config(&ServiceConfig::default(), gateway)
}

const WATERING_PLAN: &str = r#"```json
{
    "plan": "打开阀门放水，持续监测水位，达到1.5米后关闭阀门",
    "variables": [
        {"name": "阀门状态", "type": "boolean", "description": "阀门开关", "defaultValue": "false", "required": true, "constraints": "true/false"},
        {"name": "当前水位", "type": "double", "description": "实时水位(米)", "defaultValue": "0.0", "required": true, "constraints": ">= 0"}
    ],
    "steps": [
        {"stepNumber": 1, "stepName": "打开阀门", "stepType": "action", "action": "open", "involvedVariables": ["阀门状态"], "prerequisites": []},
        {"stepNumber": 2, "stepName": "监测水位", "stepType": "loop", "action": "monitor", "involvedVariables": ["当前水位"], "prerequisites": [1], "isLoop": true, "loopCondition": "当前水位 < 1.5"},
        {"stepNumber": 3, "stepName": "关闭阀门", "stepType": "action", "action": "close", "involvedVariables": ["阀门状态"], "prerequisites": [2]}
    ],
    "logicDescription": "循环监测直到水位达标",
    "executionOrder": "1 -> 2 -> 3",
    "estimatedDuration": 600,
    "complexityLevel": 2
}
```"#;

// ═══════════════════════════════════════════════════════════════════════
//  Scenarios
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn negative_verdict_is_returned_without_decomposing() {
    let gateway = Routed::new(
        r#"{"isWorkflowIntent": false, "confidence": 0.95, "intentCategory": "其他", "reason": "天气咨询"}"#,
        WATERING_PLAN,
    );
    let envelope = pipeline(gateway.clone()).process("帮我判断今天天气", None).await;

    assert_eq!(envelope.code, 200);
    assert!(envelope.correlation_id.is_some());
    match envelope.data {
        Some(GenerateResult::Intent(verdict)) => {
            assert!(!verdict.is_intent);
            assert_eq!(verdict.category, "其他");
        }
        other => panic!("expected a verdict, got {other:?}"),
    }
    assert_eq!(gateway.intent_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.plan_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn positive_verdict_is_decomposed() {
    let gateway = Routed::new(
        r#"{"isWorkflowIntent": true, "confidence": 0.92, "intentCategory": "工作流生成", "reason": "包含循环监测"}"#,
        WATERING_PLAN,
    );
    let envelope = pipeline(gateway.clone())
        .process("打开阀门放水，直到水位达到1.5米后关闭", Some("req-water"))
        .await;

    assert_eq!(envelope.code, 200);
    assert_eq!(envelope.correlation_id.as_deref(), Some("req-water"));
    match envelope.data {
        Some(GenerateResult::Plan(plan)) => {
            assert_eq!(plan.steps.len(), 3);
            assert_eq!(plan.variables.len(), 2);
            assert_eq!(plan.correlation_id, "req-water");
            assert!(plan.steps[1].is_loop);
        }
        other => panic!("expected a plan, got {other:?}"),
    }
    assert_eq!(gateway.plan_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_credential_degrades_without_error_envelope() {
    let gateway = Arc::new(Unconfigured {
        calls: AtomicUsize::new(0),
    });
    let p = pipeline(gateway.clone());

    let envelope = p.process("每天早上打开窗帘", None).await;
    assert_eq!(envelope.code, 200);
    match envelope.data {
        Some(GenerateResult::Intent(verdict)) => {
            assert!(!verdict.is_intent);
            assert_eq!(verdict.category, "error");
        }
        other => panic!("expected a verdict, got {other:?}"),
    }

    let plan = p.decompose_only("每天早上打开窗帘").await.data.unwrap();
    assert!(plan.steps.is_empty());
    assert!(plan.variables.is_empty());
    assert_eq!(plan.estimated_duration_seconds, 0);

    assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sub_threshold_claim_stops_at_classification() {
    let gateway = Routed::new(r#"{"isWorkflowIntent": true, "confidence": 0.5}"#, WATERING_PLAN);
    let envelope = pipeline(gateway.clone()).process("也许可以自动化", None).await;

    assert!(matches!(
        envelope.data,
        Some(GenerateResult::Intent(ref v)) if !v.is_intent
    ));
    assert_eq!(gateway.plan_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicking_gateway_yields_500_envelope() {
    let p = pipeline(Arc::new(Panicking));

    let envelope = p.process("打开阀门", Some("req-panic")).await;
    assert_eq!(envelope.code, 500);
    assert!(envelope.message.starts_with("工作流生成失败: "));
    assert!(envelope.message.contains("gateway bug"));
    assert_eq!(envelope.correlation_id.as_deref(), Some("req-panic"));
    assert!(envelope.data.is_none());

    let envelope = p.classify_only("打开阀门").await;
    assert_eq!(envelope.code, 500);
    assert!(envelope.message.starts_with("意图识别失败: "));

    let envelope = p.decompose_only("打开阀门").await;
    assert_eq!(envelope.code, 500);
    assert!(envelope.message.starts_with("任务分解失败: "));
}

// ═══════════════════════════════════════════════════════════════════════
//  Single-stage entry points and validation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn single_stage_entry_points_mint_fresh_ids() {
    let gateway = Routed::new(r#"{"isWorkflowIntent": true, "confidence": 0.9}"#, WATERING_PLAN);
    let p = pipeline(gateway.clone());

    let a = p.classify_only("打开阀门").await;
    let b = p.classify_only("打开阀门").await;
    assert_eq!(a.code, 200);
    assert_ne!(a.correlation_id, b.correlation_id);
    assert!(a.data.unwrap().is_intent);

    let plan = p.decompose_only("打开阀门").await;
    assert_eq!(plan.data.unwrap().steps.len(), 3);
    assert_eq!(gateway.intent_calls.load(Ordering::SeqCst), 2);
    assert_eq!(gateway.plan_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_requests_never_reach_the_gateway() {
    let gateway = Arc::new(Unconfigured {
        calls: AtomicUsize::new(0),
    });
    let p = pipeline(gateway.clone());

    let envelope = p.generate(&WorkflowRequest::new("   ")).await;
    assert_eq!(envelope.code, 400);
    assert_eq!(envelope.message, "参数校验失败: 描述不能为空");

    let envelope = p.classify_only(&"长".repeat(2001)).await;
    assert_eq!(envelope.code, 400);
    assert!(envelope.message.starts_with("参数校验失败: "));

    let envelope = p.decompose_only("").await;
    assert_eq!(envelope.code, 400);

    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generate_honours_request_id() {
    let gateway = Routed::new(r#"{"isWorkflowIntent": false, "confidence": 0.1}"#, "{}");
    let request = WorkflowRequest {
        description: "你好".into(),
        user_id: Some("u-1".into()),
        request_id: Some("req-given".into()),
    };
    let envelope = pipeline(gateway).generate(&request).await;
    assert_eq!(envelope.correlation_id.as_deref(), Some("req-given"));
}

#[test]
fn health_envelope_carries_message() {
    let json = serde_json::to_value(pipeline(Routed::new("{}", "{}")).health()).unwrap();
    assert_eq!(json["data"], "工作流生成服务运行正常");
    assert_eq!(json["code"], 200);
}

#[tokio::test]
async fn payload_serializes_without_variant_tag() {
    let gateway = Routed::new(r#"{"isWorkflowIntent": false, "confidence": 0.3}"#, "{}");
    let envelope = pipeline(gateway).process("你好", Some("req-s")).await;
    let json = serde_json::to_value(&envelope).unwrap();

    assert_eq!(json["data"]["isIntent"], false);
    assert_eq!(json["data"]["correlationId"], "req-s");
    assert!(json["data"].get("Intent").is_none());
}
