//! Plan decomposer.
//!
//! Turns a free-text workflow description into a [`Plan`] of typed variables
//! and ordered, dependency-linked steps, using a single completion call.
//!
//! Reading the reply degrades in stages, all sharing one fallback policy
//! (sentinel text from [`scan::sentinel`], 60 s duration, complexity 3, and
//! the placeholder variable/step):
//!
//! 1. The reply is a JSON object: every field is read from the tree, each
//!    with its own default.
//! 2. The reply is not JSON: scalar fields are salvaged by string scanning
//!    and the lists fall back to a single placeholder each.
//! 3. The reply is JSON but not an object: the synthesized default plan.
//!
//! When the gateway itself fails, the result is [`Plan::failed`] instead:
//! empty lists and zeroed estimates.

mod types;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::DecompositionSettings;
use crate::llm::CompletionGateway;
use crate::outcome::{StageFailure, StageOutcome};
use crate::reply::{
    bool_or, i64_or, int_list, opt_text, param_map, scan, string_list, strip_code_fences, text_or,
};

pub use types::{
    DEFAULT_COMPLEXITY, DEFAULT_DURATION_SECS, DanglingReference, Plan, Step, Variable,
};

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

const DECOMPOSITION_PROMPT: &str = r#"你是一名工作流设计师，负责把自然语言描述拆解为可以逐步执行的工作流。

用户描述："{{userInput}}"

请完成以下工作：
1. plan：分析需求，给出总体执行计划，指出其中的顺序、判断与循环结构。
2. variables：列出所需的全部变量（不超过 {{variableLimit}} 个），为每个变量给出类型（如 double、boolean、int、String）、业务含义、默认值和约束；相关联的变量要说明关联关系，不要定义无关变量。
3. steps：把任务拆为原子步骤（不超过 {{maxSteps}} 步），每一步只做一个动作或判断，标明类型（action / condition / loop）、依赖的前置步骤编号、涉及的变量；判断和循环必须写出明确的条件表达式，步骤中使用的变量必须已在 variables 中定义。
4. logicDescription：说明执行逻辑、循环与判断的实现方式、异常与边界情况。

只返回如下结构的 JSON：
{
    "plan": "总体执行计划",
    "variables": [
        {
            "name": "变量名",
            "type": "变量类型",
            "description": "变量描述",
            "defaultValue": "默认值",
            "required": true,
            "constraints": "约束条件"
        }
    ],
    "steps": [
        {
            "stepNumber": 1,
            "stepName": "步骤名称",
            "description": "步骤描述",
            "stepType": "action",
            "action": "具体动作",
            "condition": "条件表达式（判断步骤）",
            "involvedVariables": ["变量名"],
            "parameters": {"参数名": "参数值"},
            "prerequisites": [],
            "isLoop": false,
            "loopCondition": "循环条件（循环步骤）"
        }
    ],
    "logicDescription": "详细的逻辑说明",
    "executionOrder": "执行顺序说明",
    "estimatedDuration": 60,
    "complexityLevel": 3
}

示例（放水至水位 1.5m）：变量 valveStatus(boolean)、waterLevel(double)、targetLevel(double)；步骤为初始化变量、打开阀门、循环监测水位、判断是否达到目标、关闭阀门；逻辑为循环监测直到水位 >= 目标值后退出。

变量名和步骤请使用中文。"#;

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Configuration for the decomposer.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Upper bound on steps requested in the prompt.
    pub max_steps: usize,
    /// Upper bound on variables requested in the prompt.
    pub variable_limit: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        DecompositionSettings::default().into()
    }
}

impl From<DecompositionSettings> for PlannerConfig {
    fn from(settings: DecompositionSettings) -> Self {
        Self {
            max_steps: settings.max_steps,
            variable_limit: settings.variable_limit,
        }
    }
}

/// Decomposes workflow descriptions into plans.
pub struct Planner {
    gateway: Arc<dyn CompletionGateway>,
    config: PlannerConfig,
}

impl Planner {
    /// Create a new planner.
    pub fn new(gateway: Arc<dyn CompletionGateway>, config: PlannerConfig) -> Self {
        Self { gateway, config }
    }

    /// Decompose `user_text` into a plan.
    ///
    /// Never fails: see the module docs for what comes back in each failure
    /// mode.  The [`StageOutcome`] records whether a fallback was used.
    pub async fn decompose(&self, user_text: &str, correlation_id: &str) -> StageOutcome<Plan> {
        info!(correlation_id, user_text, "starting decomposition");

        let prompt = self.build_prompt(user_text);
        let reply = match self.gateway.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(correlation_id, error = %e, "decomposition failed");
                return StageOutcome::degraded(Plan::failed(correlation_id, &e.to_string()), e);
            }
        };
        debug!(correlation_id, reply = %reply, "model reply");

        let outcome = self.parse_plan(&reply, correlation_id);
        let plan = outcome.value();
        info!(
            correlation_id,
            variables = plan.variables.len(),
            steps = plan.steps.len(),
            degraded = outcome.is_degraded(),
            "decomposition finished"
        );
        outcome
    }

    /// Substitute the description and limits into the prompt template.
    pub fn build_prompt(&self, user_text: &str) -> String {
        DECOMPOSITION_PROMPT
            .replace("{{maxSteps}}", &self.config.max_steps.to_string())
            .replace("{{variableLimit}}", &self.config.variable_limit.to_string())
            .replace("{{userInput}}", user_text)
    }

    /// Read a model reply into a plan.
    pub fn parse_plan(&self, reply: &str, correlation_id: &str) -> StageOutcome<Plan> {
        let body = strip_code_fences(reply);

        if body.is_empty() {
            warn!(correlation_id, "empty decomposition reply, using default plan");
            return StageOutcome::degraded(
                Plan::synthesized_default(correlation_id),
                StageFailure::Unparseable {
                    reason: "empty reply".into(),
                },
            );
        }

        match serde_json::from_str::<Value>(body) {
            Ok(tree) if tree.is_object() => {
                let plan = plan_from_tree(&tree, correlation_id);
                self.inspect(&plan);
                StageOutcome::Completed(plan)
            }
            Ok(tree) => {
                warn!(correlation_id, "decomposition reply is not a JSON object, using default plan");
                StageOutcome::degraded(
                    Plan::synthesized_default(correlation_id),
                    StageFailure::Unparseable {
                        reason: format!("expected a JSON object, got {}", json_kind(&tree)),
                    },
                )
            }
            Err(e) => {
                warn!(correlation_id, error = %e, "decomposition reply is not valid JSON, salvaging scalars");
                StageOutcome::degraded(
                    plan_from_scan(body, correlation_id),
                    StageFailure::Unparseable {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    /// Log limit overruns and unresolved references.  Nothing is truncated.
    fn inspect(&self, plan: &Plan) {
        if plan.steps.len() > self.config.max_steps {
            warn!(
                steps = plan.steps.len(),
                max_steps = self.config.max_steps,
                "plan exceeds the requested step limit"
            );
        }
        if plan.variables.len() > self.config.variable_limit {
            warn!(
                variables = plan.variables.len(),
                variable_limit = self.config.variable_limit,
                "plan exceeds the requested variable limit"
            );
        }
        let dangling = plan.dangling_references();
        if !dangling.is_empty() {
            debug!(?dangling, "plan contains unresolved references");
        }
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

fn plan_from_tree(tree: &Value, correlation_id: &str) -> Plan {
    let variables = tree
        .get("variables")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(variable_from_node).collect())
        .unwrap_or_default();

    let steps = tree
        .get("steps")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, node)| step_from_node(node, i as i64 + 1))
                .collect()
        })
        .unwrap_or_default();

    Plan {
        plan_summary: text_or(tree, "plan", &scan::sentinel("plan")),
        variables,
        steps,
        logic_description: text_or(tree, "logicDescription", &scan::sentinel("logicDescription")),
        execution_order: text_or(tree, "executionOrder", &scan::sentinel("executionOrder")),
        estimated_duration_seconds: i64_or(tree, "estimatedDuration", DEFAULT_DURATION_SECS),
        complexity_level: i64_or(tree, "complexityLevel", DEFAULT_COMPLEXITY),
        correlation_id: correlation_id.to_owned(),
        produced_at: chrono::Utc::now(),
    }
}

fn plan_from_scan(body: &str, correlation_id: &str) -> Plan {
    Plan {
        plan_summary: scan::scan_string(body, "plan"),
        variables: vec![Variable::placeholder()],
        steps: vec![Step::placeholder()],
        logic_description: scan::scan_string(body, "logicDescription"),
        execution_order: scan::scan_string(body, "executionOrder"),
        estimated_duration_seconds: scan::scan_int(body, "estimatedDuration", DEFAULT_DURATION_SECS),
        complexity_level: scan::scan_int(body, "complexityLevel", DEFAULT_COMPLEXITY),
        correlation_id: correlation_id.to_owned(),
        produced_at: chrono::Utc::now(),
    }
}

fn variable_from_node(node: &Value) -> Variable {
    Variable {
        name: text_or(node, "name", "unknown"),
        var_type: text_or(node, "type", "String"),
        description: text_or(node, "description", "无描述"),
        default_value: text_or(node, "defaultValue", ""),
        required: bool_or(node, "required", true),
        constraints: text_or(node, "constraints", "无约束"),
    }
}

fn step_from_node(node: &Value, position: i64) -> Step {
    Step {
        step_number: i64_or(node, "stepNumber", position),
        name: text_or(node, "stepName", "未命名步骤"),
        description: text_or(node, "description", "无描述"),
        step_type: text_or(node, "stepType", "action"),
        action: text_or(node, "action", "process"),
        condition: opt_text(node, "condition"),
        involved_variables: string_list(node, "involvedVariables"),
        parameters: param_map(node, "parameters"),
        prerequisites: int_list(node, "prerequisites"),
        is_loop: bool_or(node, "isLoop", false),
        loop_condition: opt_text(node, "loopCondition"),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::{AgentError, Result};
    use crate::reply::ParamValue;

    struct Scripted(&'static str);

    #[async_trait]
    impl CompletionGateway for Scripted {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_owned())
        }
    }

    struct Down;

    #[async_trait]
    impl CompletionGateway for Down {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(AgentError::UpstreamError {
                reason: "API returned 502 Bad Gateway".into(),
            })
        }
    }

    fn planner(gateway: impl CompletionGateway + 'static) -> Planner {
        Planner::new(Arc::new(gateway), PlannerConfig::default())
    }

    const WATERING: &str = r#"{
        "plan": "打开阀门并监测水位",
        "variables": [
            {"name": "阀门状态", "type": "boolean", "description": "阀门是否打开", "defaultValue": "false", "required": true, "constraints": "true/false"},
            {"name": "当前水位", "type": "double", "description": "实时水位", "defaultValue": "0.0", "required": true, "constraints": ">= 0"},
            {"name": "目标水位", "type": "double", "description": "目标水位", "defaultValue": "1.5", "required": false, "constraints": "> 0"}
        ],
        "steps": [
            {"stepNumber": 1, "stepName": "打开阀门", "description": "开阀", "stepType": "action", "action": "open_valve", "involvedVariables": ["阀门状态"], "parameters": {"valve": "A", "force": true}, "prerequisites": [], "isLoop": false},
            {"stepNumber": 2, "stepName": "监测水位", "description": "循环读取水位", "stepType": "loop", "action": "read_level", "involvedVariables": ["当前水位", "目标水位"], "parameters": {"interval": 5}, "prerequisites": [1], "isLoop": true, "loopCondition": "当前水位 < 目标水位"},
            {"stepNumber": 3, "stepName": "关闭阀门", "description": "关阀", "stepType": "condition", "action": "close_valve", "condition": "当前水位 >= 目标水位", "involvedVariables": ["阀门状态"], "parameters": {}, "prerequisites": [2], "isLoop": false}
        ],
        "logicDescription": "循环监测直到达到目标",
        "executionOrder": "1 -> 2 -> 3",
        "estimatedDuration": 300,
        "complexityLevel": 2
    }"#;

    #[test]
    fn prompt_substitutes_input_and_limits() {
        let prompt = planner(Down).build_prompt("放水到1.5米");
        assert!(prompt.contains("用户描述：\"放水到1.5米\""));
        assert!(prompt.contains("不超过 10 步"));
        assert!(prompt.contains("不超过 20 个"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn well_formed_reply_round_trips() {
        let outcome = planner(Down).parse_plan(WATERING, "req-1");
        assert!(!outcome.is_degraded());
        let plan = outcome.into_value();

        assert_eq!(plan.plan_summary, "打开阀门并监测水位");
        assert_eq!(plan.variables.len(), 3);
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(
            plan.variables.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            vec!["阀门状态", "当前水位", "目标水位"]
        );
        assert_eq!(plan.variables[1].var_type, "double");
        assert!(!plan.variables[2].required);

        let looped = &plan.steps[1];
        assert_eq!(looped.step_number, 2);
        assert_eq!(looped.step_type, "loop");
        assert!(looped.is_loop);
        assert_eq!(looped.loop_condition.as_deref(), Some("当前水位 < 目标水位"));
        assert_eq!(looped.prerequisites, vec![1]);
        assert_eq!(looped.involved_variables, vec!["当前水位", "目标水位"]);
        assert_eq!(looped.parameters["interval"], ParamValue::Text("5".into()));
        assert_eq!(plan.steps[0].parameters["force"], ParamValue::Flag(true));
        assert_eq!(plan.steps[2].condition.as_deref(), Some("当前水位 >= 目标水位"));

        assert_eq!(plan.logic_description, "循环监测直到达到目标");
        assert_eq!(plan.execution_order, "1 -> 2 -> 3");
        assert_eq!(plan.estimated_duration_seconds, 300);
        assert_eq!(plan.complexity_level, 2);
        assert_eq!(plan.correlation_id, "req-1");
    }

    #[test]
    fn fenced_reply_parses_like_bare_reply() {
        let fenced = format!("```json\n{WATERING}\n```");
        let bare = planner(Down).parse_plan(WATERING, "r").into_value();
        let wrapped = planner(Down).parse_plan(&fenced, "r").into_value();
        assert_eq!(bare.steps, wrapped.steps);
        assert_eq!(bare.variables, wrapped.variables);
        assert_eq!(bare.plan_summary, wrapped.plan_summary);
    }

    #[test]
    fn element_fields_fall_back_individually() {
        let reply = r#"{"variables": [{}], "steps": [{}, {"stepName": "second"}]}"#;
        let plan = planner(Down).parse_plan(reply, "r").into_value();

        let var = &plan.variables[0];
        assert_eq!(var.name, "unknown");
        assert_eq!(var.var_type, "String");
        assert_eq!(var.description, "无描述");
        assert_eq!(var.default_value, "");
        assert!(var.required);
        assert_eq!(var.constraints, "无约束");

        assert_eq!(plan.steps[0].step_number, 1);
        assert_eq!(plan.steps[0].name, "未命名步骤");
        assert_eq!(plan.steps[0].step_type, "action");
        assert_eq!(plan.steps[0].action, "process");
        assert!(plan.steps[0].condition.is_none());
        assert!(!plan.steps[0].is_loop);
        assert_eq!(plan.steps[1].step_number, 2);
        assert_eq!(plan.steps[1].name, "second");

        assert_eq!(plan.plan_summary, "未能解析plan");
        assert_eq!(plan.logic_description, "未能解析logicDescription");
        assert_eq!(plan.estimated_duration_seconds, 60);
        assert_eq!(plan.complexity_level, 3);
    }

    #[test]
    fn object_without_lists_gives_empty_lists() {
        let plan = planner(Down)
            .parse_plan(r#"{"plan": "p", "estimatedDuration": 15}"#, "r")
            .into_value();
        assert!(plan.variables.is_empty());
        assert!(plan.steps.is_empty());
        assert_eq!(plan.estimated_duration_seconds, 15);
    }

    #[test]
    fn invalid_json_salvages_scalars_with_placeholder_lists() {
        let reply = r#"{"plan": "部分计划", "estimatedDuration": 90, "steps": [ {"stepNumber": 1,"#;
        let outcome = planner(Down).parse_plan(reply, "r");
        assert_eq!(outcome.failure().map(StageFailure::kind), Some("unparseable"));

        let plan = outcome.into_value();
        assert_eq!(plan.plan_summary, "部分计划");
        assert_eq!(plan.estimated_duration_seconds, 90);
        assert_eq!(plan.complexity_level, 3);
        assert_eq!(plan.variables, vec![Variable::placeholder()]);
        assert_eq!(plan.steps, vec![Step::placeholder()]);
    }

    #[test]
    fn garbage_reply_yields_single_placeholders_and_defaults() {
        let plan = planner(Down).parse_plan("I cannot help with that.", "r").into_value();
        assert_eq!(plan.variables.len(), 1);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.estimated_duration_seconds, 60);
        assert_eq!(plan.complexity_level, 3);
        assert!(!plan.plan_summary.is_empty());
    }

    #[test]
    fn non_object_json_yields_synthesized_default() {
        for reply in [r#"["a", "b"]"#, r#""just text""#, "42", "```json\n```"] {
            let outcome = planner(Down).parse_plan(reply, "r");
            assert!(outcome.is_degraded(), "reply: {reply}");
            let plan = outcome.into_value();
            assert_eq!(plan.plan_summary, "基于用户输入生成的基础工作流计划");
            assert_eq!(plan.steps.len(), 1);
            assert_eq!(plan.variables.len(), 1);
        }
    }

    #[tokio::test]
    async fn gateway_failure_yields_empty_plan() {
        let outcome = planner(Down).decompose("放水", "req-9").await;
        assert_eq!(outcome.failure().map(StageFailure::kind), Some("upstream_error"));

        let plan = outcome.into_value();
        assert!(plan.variables.is_empty());
        assert!(plan.steps.is_empty());
        assert_eq!(plan.estimated_duration_seconds, 0);
        assert_eq!(plan.complexity_level, 0);
        assert!(plan.plan_summary.starts_with("任务分解失败: "));
        assert!(plan.plan_summary.contains("502"));
        assert_eq!(plan.correlation_id, "req-9");
    }

    #[tokio::test]
    async fn decompose_uses_gateway_reply() {
        let outcome = planner(Scripted(WATERING)).decompose("放水", "req-10").await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.value().steps.len(), 3);
    }

    #[test]
    fn plan_over_limits_is_not_truncated() {
        let planner = Planner::new(
            Arc::new(Down),
            PlannerConfig {
                max_steps: 1,
                variable_limit: 1,
            },
        );
        let plan = planner.parse_plan(WATERING, "r").into_value();
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.variables.len(), 3);
    }
}
