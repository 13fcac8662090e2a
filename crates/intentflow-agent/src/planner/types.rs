//! Plan types produced by the decomposer.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reply::ParamValue;

/// Fallback duration, in seconds, when the model gives none.
pub const DEFAULT_DURATION_SECS: i64 = 60;

/// Fallback complexity level when the model gives none.
pub const DEFAULT_COMPLEXITY: i64 = 3;

// ---------------------------------------------------------------------------
// Variable
// ---------------------------------------------------------------------------

/// A variable the workflow reads or writes.
///
/// `var_type` is a free-form tag (`double`, `boolean`, `String`, ...) and is
/// not checked against a fixed set.  Names are not required to be unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    pub description: String,
    pub default_value: String,
    pub required: bool,
    pub constraints: String,
}

impl Variable {
    /// The stand-in used when the variable list could not be read at all.
    pub fn placeholder() -> Self {
        Self {
            name: "defaultVariable".into(),
            var_type: "String".into(),
            description: "默认变量".into(),
            default_value: String::new(),
            required: false,
            constraints: "无约束".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One atomic step of the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_number: i64,
    pub name: String,
    pub description: String,
    /// `action`, `condition`, `loop`, or whatever the model chose.
    pub step_type: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub involved_variables: Vec<String>,
    pub parameters: BTreeMap<String, ParamValue>,
    /// Step numbers that must run first.  Not checked against the plan.
    pub prerequisites: Vec<i64>,
    pub is_loop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_condition: Option<String>,
}

impl Step {
    /// The stand-in used when the step list could not be read at all.
    pub fn placeholder() -> Self {
        Self {
            step_number: 1,
            name: "默认步骤".into(),
            description: "默认步骤描述".into(),
            step_type: "action".into(),
            action: "process".into(),
            condition: None,
            involved_variables: Vec::new(),
            parameters: BTreeMap::new(),
            prerequisites: Vec::new(),
            is_loop: false,
            loop_condition: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A decomposed workflow: variables, ordered steps, and narrative metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub plan_summary: String,
    pub variables: Vec<Variable>,
    pub steps: Vec<Step>,
    pub logic_description: String,
    pub execution_order: String,
    pub estimated_duration_seconds: i64,
    /// Conventionally 1..=5; not enforced.
    pub complexity_level: i64,
    pub correlation_id: String,
    pub produced_at: DateTime<Utc>,
}

impl Plan {
    /// The plan returned when a reply arrived but could not be read as an
    /// object: fixed narrative, one placeholder variable and step.
    pub fn synthesized_default(correlation_id: &str) -> Self {
        Self {
            plan_summary: "基于用户输入生成的基础工作流计划".into(),
            variables: vec![Variable::placeholder()],
            steps: vec![Step::placeholder()],
            logic_description: "包含初始化、执行、监测和完成四个主要阶段".into(),
            execution_order: "按步骤编号顺序执行，支持循环和条件判断".into(),
            estimated_duration_seconds: DEFAULT_DURATION_SECS,
            complexity_level: DEFAULT_COMPLEXITY,
            correlation_id: correlation_id.to_owned(),
            produced_at: Utc::now(),
        }
    }

    /// The plan returned when no reply could be obtained: empty lists and
    /// zeroed estimates, with the failure in the summary.
    pub fn failed(correlation_id: &str, detail: &str) -> Self {
        Self {
            plan_summary: format!("任务分解失败: {detail}"),
            variables: Vec::new(),
            steps: Vec::new(),
            logic_description: "由于错误无法生成逻辑描述".into(),
            execution_order: "无法确定执行顺序".into(),
            estimated_duration_seconds: 0,
            complexity_level: 0,
            correlation_id: correlation_id.to_owned(),
            produced_at: Utc::now(),
        }
    }

    /// References inside steps that do not resolve within this plan.
    ///
    /// Purely diagnostic; the plan is never altered because of them.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let step_numbers: HashSet<i64> = self.steps.iter().map(|s| s.step_number).collect();
        let variable_names: HashSet<&str> = self.variables.iter().map(|v| v.name.as_str()).collect();

        let mut dangling = Vec::new();
        for step in &self.steps {
            for &missing in &step.prerequisites {
                if !step_numbers.contains(&missing) {
                    dangling.push(DanglingReference::Prerequisite {
                        step: step.step_number,
                        missing,
                    });
                }
            }
            for name in &step.involved_variables {
                if !variable_names.contains(name.as_str()) {
                    dangling.push(DanglingReference::Variable {
                        step: step.step_number,
                        name: name.clone(),
                    });
                }
            }
        }
        dangling
    }
}

/// An unresolved reference found by [`Plan::dangling_references`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DanglingReference {
    Prerequisite { step: i64, missing: i64 },
    Variable { step: i64, name: String },
}
