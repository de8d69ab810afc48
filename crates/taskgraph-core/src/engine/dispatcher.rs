//! Task Engine dispatch loop (C6) — walks the planner's levels in order,
//! building a `StepConfig` and submitting a `TaskJob` for each step that
//! isn't already covered by a pre-supplied output.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::engine::{TaskBackend, TaskJob};
use crate::error::EngineError;
use crate::model::{TemplateDefaults, Value, WorkflowTemplate};
use crate::planner::{build_step_config, plan};

/// The mapping from step name to the task id the dispatcher submitted for
/// it, plus any step names the planner had to soft-drop.
#[derive(Debug, Clone, Default)]
pub struct DispatchResult {
    pub step_task_ids: HashMap<String, String>,
    /// The effective queue each dispatched step was submitted to (after the
    /// `parallel_task` -> `io_queue` override), keyed by step name.
    pub step_queues: HashMap<String, String>,
    pub dropped: Vec<String>,
}

/// Exposes a template's defaults as the name/value pairs the planner and
/// the dispatcher's known-values set should seed availability with, per
/// `available ← keys(initial_inputs) ∪ keys(defaults)`.
fn defaults_as_values(defaults: &TemplateDefaults) -> Vec<(String, Value)> {
    let mut values = Vec::new();
    if let Some(v) = &defaults.template_id {
        values.push(("template_id".to_string(), Value::string(v.clone())));
    }
    if let Some(v) = &defaults.prompt_config_src {
        values.push(("prompt_config_src".to_string(), Value::string(v.clone())));
    }
    if let Some(v) = &defaults.database {
        values.push(("database".to_string(), Value::string(v.clone())));
    }
    values
}

pub struct Dispatcher {
    backend: Arc<dyn TaskBackend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn TaskBackend>) -> Self {
        Self { backend }
    }

    /// Dispatches every step of `template` for one workflow run.
    ///
    /// `initial_inputs` are the caller-supplied values available before any
    /// step runs. `pre_supplied_outputs` lets a caller skip re-running a step
    /// whose output it already has (the idempotency shortcut) — its value is
    /// folded into `known_values` for downstream steps exactly as if the step
    /// had executed.
    pub async fn dispatch(
        &self,
        workflow_id: &str,
        template: &WorkflowTemplate,
        initial_inputs: HashMap<String, Value>,
        pre_supplied_outputs: HashMap<String, Value>,
    ) -> Result<DispatchResult, EngineError> {
        let mut known_values = initial_inputs;
        for (name, value) in defaults_as_values(&template.defaults) {
            known_values.entry(name).or_insert(value);
        }
        let available_names: HashSet<String> = known_values.keys().cloned().collect();
        let outcome = plan(template, &available_names);

        let known_step_names: HashSet<String> =
            template.steps.iter().map(|s| s.step.clone()).collect();
        let mut step_task_ids: HashMap<String, String> = HashMap::new();
        let mut step_queues: HashMap<String, String> = HashMap::new();

        for level in &outcome.levels {
            for step in level {
                if let Some(output) = pre_supplied_outputs.get(&step.step) {
                    tracing::debug!(step = %step.step, "step output pre-supplied; skipping dispatch");
                    known_values.insert(step.step.clone(), output.clone());
                    continue;
                }

                let cfg = build_step_config(step, &template.defaults, &known_values, &known_step_names);

                let job = TaskJob {
                    workflow_id: workflow_id.to_string(),
                    step: cfg.clone(),
                    sibling_task_ids: step_task_ids.clone(),
                    pre_supplied_outputs: pre_supplied_outputs.clone(),
                };

                let task_id = self.backend.submit(&cfg.queue, job).await?;
                tracing::info!(step = %step.step, task_id, queue = %cfg.queue, "dispatched step");
                step_queues.insert(step.step.clone(), cfg.queue.clone());
                step_task_ids.insert(step.step.clone(), task_id);
            }
        }

        if !outcome.dropped.is_empty() {
            tracing::warn!(dropped = ?outcome.dropped, workflow_id, "steps dropped by planner were never dispatched");
        }

        Ok(DispatchResult {
            step_task_ids,
            step_queues,
            dropped: outcome.dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{EchoLlmClient, StaticPromptStore};
    use crate::engine::local::{BackendConfig, LocalTaskBackend};
    use crate::executor::{PromptExecutor, Registry, Worker, WorkerConfig};
    use crate::model::{StepDefinition, TaskOutcome, TemplateDefaults};
    use std::time::Duration;

    fn local_backend() -> Arc<dyn TaskBackend> {
        let registry = Arc::new(Registry::with_default_operations());
        let prompt_executor = Arc::new(PromptExecutor::new(
            Arc::new(StaticPromptStore::new()),
            Arc::new(EchoLlmClient),
        ));
        let worker = Worker::new(registry, prompt_executor, WorkerConfig::default());
        Arc::new(LocalTaskBackend::new(worker, None, None, BackendConfig::default()))
    }

    fn step(name: &str, pipeline_key: &str, inputs: &[&str]) -> StepDefinition {
        StepDefinition {
            step: name.to_string(),
            pipeline_key: pipeline_key.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            optional_inputs: Vec::new(),
            action: "section".to_string(),
            section_id: None,
            queue: None,
            parallel_task: false,
            parallel_inputs: Vec::new(),
            parallel_merge: false,
            json_object: false,
            notifications: None,
        }
    }

    #[tokio::test]
    async fn dispatches_levels_in_order_and_wires_prerequisites() {
        let template = WorkflowTemplate {
            defaults: TemplateDefaults::default(),
            steps: vec![step("A", "uppercase", &["x"]), step("B", "echo", &["A"])],
        };

        let backend = local_backend();
        let dispatcher = Dispatcher::new(backend.clone());

        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), Value::string("hi"));

        let result = dispatcher
            .dispatch("wf-1", &template, inputs, HashMap::new())
            .await
            .unwrap();

        assert_eq!(result.step_task_ids.len(), 2);
        assert!(result.dropped.is_empty());

        let task_b = result.step_task_ids.get("B").unwrap();
        let outcome = backend.wait(task_b, Duration::from_secs(5)).await.unwrap();
        match outcome {
            TaskOutcome::Success(r) => assert_eq!(r.response, serde_json::json!("HI")),
            TaskOutcome::Failed(e) => panic!("expected success: {e}"),
        }
    }

    #[tokio::test]
    async fn pre_supplied_output_skips_dispatch() {
        let template = WorkflowTemplate {
            defaults: TemplateDefaults::default(),
            steps: vec![step("A", "uppercase", &["x"]), step("B", "echo", &["A"])],
        };

        let backend = local_backend();
        let dispatcher = Dispatcher::new(backend.clone());

        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), Value::string("hi"));
        let mut pre_supplied = HashMap::new();
        pre_supplied.insert("A".to_string(), Value::string("already done"));

        let result = dispatcher
            .dispatch("wf-1", &template, inputs, pre_supplied)
            .await
            .unwrap();

        assert!(!result.step_task_ids.contains_key("A"));
        assert!(result.step_task_ids.contains_key("B"));
    }
}
