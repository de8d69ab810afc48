//! Data model: templates, step definitions, runtime step config, and task records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A step input value. Wraps either a plain JSON scalar/object or an explicit
/// reference to a sibling step's task id, so prerequisite resolution is a
/// pattern match instead of a runtime heuristic on string shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    TaskRef(TaskRef),
    Json(serde_json::Value),
}

/// A reference to another step's task id, carried through a task's inputs
/// until Phase 2 resolves it to the sibling's response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRef {
    pub task_id: String,
}

impl Value {
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::Json(serde_json::Value::String(s.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// True if this value, or anything nested inside it, equals the skip sentinel.
    pub fn contains_skip_sentinel(&self) -> bool {
        const SENTINEL: &str = "SkiPeD!!";
        match self {
            Value::Json(v) => json_contains_str(v, SENTINEL),
            Value::TaskRef(_) => false,
        }
    }
}

fn json_contains_str(v: &serde_json::Value, needle: &str) -> bool {
    match v {
        serde_json::Value::String(s) => s == needle,
        serde_json::Value::Array(items) => items.iter().any(|i| json_contains_str(i, needle)),
        serde_json::Value::Object(map) => map.values().any(|i| json_contains_str(i, needle)),
        _ => false,
    }
}

/// A single node of a workflow template's step graph, as parsed from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub step: String,
    pub pipeline_key: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub optional_inputs: Vec<String>,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub parallel_task: bool,
    #[serde(default)]
    pub parallel_inputs: Vec<String>,
    #[serde(default)]
    pub parallel_merge: bool,
    #[serde(default)]
    pub json_object: bool,
    #[serde(default)]
    pub notifications: Option<serde_json::Value>,
}

fn default_action() -> String {
    "section".to_string()
}

/// Shared defaults carried by every step unless overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateDefaults {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub prompt_config_src: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// A parsed workflow template (`templates/{name}.yml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    #[serde(default)]
    pub defaults: TemplateDefaults,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl WorkflowTemplate {
    pub fn from_yaml(contents: &str) -> Result<Self, crate::error::EngineError> {
        serde_yaml::from_str(contents)
            .map_err(|e| crate::error::EngineError::TemplateInvalid(e.to_string()))
    }
}

/// The runtime-materialised view of a `StepDefinition`, produced by the
/// planner and handed to the dispatcher/worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub step: String,
    pub pipeline_key: String,
    pub action: String,
    pub section_id: Option<String>,
    pub json_object: bool,
    pub domain_id: Option<String>,
    pub queue: String,
    pub project_name: Option<String>,
    pub prompt_config_src: Option<String>,
    pub database: Option<String>,
    /// Names already bound to a concrete value at plan time.
    pub bound_inputs: HashMap<String, Value>,
    /// Sibling step names whose results this step must wait for.
    pub prerequisites: Vec<String>,
}

impl StepConfig {
    pub fn effective_queue(&self, step: &StepDefinition) -> String {
        if step.parallel_task {
            "io_queue".to_string()
        } else {
            self.queue.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
    TimedOut,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
            TaskStatus::TimedOut => "TIMED_OUT",
        }
    }
}

/// In-flight representation of one dispatched step instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub workflow_id: String,
    pub step_name: String,
    pub pipeline_key: String,
    pub queue: String,
    pub status: TaskStatus,
}

/// The worker's terminal emission for a successful task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub workflow_id: String,
    pub action: String,
    pub response: serde_json::Value,
    pub version: String,
    pub webhook_response: bool,
}

/// The outcome a sibling observes when waiting on a task: either its result
/// or the reason it failed.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Success(TaskResult),
    Failed(String),
}
