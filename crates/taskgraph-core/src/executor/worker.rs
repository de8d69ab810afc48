//! Task Worker (C4) — the four phases executed for one dispatched step:
//! prerequisite resolution, input normalisation, step execution, emission.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::engine::{TaskBackend, TaskJob};
use crate::error::EngineError;
use crate::executor::{PromptExecutor, Registry};
use crate::model::{TaskOutcome, TaskResult, Value};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Per-prerequisite wait ceiling (Phase 1).
    pub prerequisite_ceiling: Duration,
    /// Soft deadline: past this, the worker logs a warning but keeps going.
    pub soft_deadline: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            prerequisite_ceiling: Duration::from_secs(1800),
            soft_deadline: Duration::from_secs(3600),
        }
    }
}

pub struct Worker {
    registry: Arc<Registry>,
    prompt_executor: Arc<PromptExecutor>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(registry: Arc<Registry>, prompt_executor: Arc<PromptExecutor>, config: WorkerConfig) -> Self {
        Self {
            registry,
            prompt_executor,
            config,
        }
    }

    /// Runs all four phases for one job. The hard deadline is enforced by
    /// the caller (the queue backend), which wraps this call in a timeout
    /// and records `TIMED_OUT` if it fires.
    pub async fn run(&self, backend: &dyn TaskBackend, job: &TaskJob) -> Result<TaskResult, EngineError> {
        let mut inputs = self.resolve_prerequisites(backend, job).await?;
        self.normalize_task_ref_lists(backend, &mut inputs).await?;

        let exec = self.execute_with_soft_deadline(&job.step.pipeline_key, &inputs, job);

        let response = exec.await?;

        Ok(TaskResult {
            workflow_id: job.workflow_id.clone(),
            action: job.step.action.clone(),
            response,
            version: "v1".to_string(),
            webhook_response: job.step.section_id.is_some(),
        })
    }

    /// Phase 1 — wait for every declared prerequisite, unless it was already
    /// pre-supplied in the caller's inputs.
    async fn resolve_prerequisites(
        &self,
        backend: &dyn TaskBackend,
        job: &TaskJob,
    ) -> Result<HashMap<String, Value>, EngineError> {
        let mut inputs = job.step.bound_inputs.clone();

        for prereq in &job.step.prerequisites {
            if let Some(value) = job.pre_supplied_outputs.get(prereq) {
                inputs.insert(prereq.clone(), value.clone());
                continue;
            }

            let task_id = job.sibling_task_ids.get(prereq).ok_or_else(|| {
                EngineError::Planning(format!("no task id recorded for prerequisite '{prereq}'"))
            })?;

            tracing::info!(step = %job.step.step, prereq, task_id, "waiting for prerequisite");

            match backend.wait(task_id, self.config.prerequisite_ceiling).await {
                Ok(TaskOutcome::Success(result)) => {
                    inputs.insert(prereq.clone(), Value::Json(result.response));
                }
                Ok(TaskOutcome::Failed(cause)) => {
                    return Err(EngineError::PrerequisiteFailed {
                        step: prereq.clone(),
                        cause,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(inputs)
    }

    /// Phase 2 — any bound input that is a list of UUID-shaped strings is
    /// interpreted as a list of task-id references: wait for each and
    /// replace the list with the concatenated stringified responses.
    async fn normalize_task_ref_lists(
        &self,
        backend: &dyn TaskBackend,
        inputs: &mut HashMap<String, Value>,
    ) -> Result<(), EngineError> {
        let uuid_re = Regex::new(
            r"^[a-fA-F0-9]{8}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{12}$",
        )
        .expect("static uuid regex is valid");

        let keys_to_resolve: Vec<String> = inputs
            .iter()
            .filter_map(|(k, v)| match v {
                Value::Json(serde_json::Value::Array(items)) => {
                    let starts_with_uuid = items
                        .first()
                        .and_then(|i| i.as_str())
                        .is_some_and(|s| uuid_re.is_match(s));
                    starts_with_uuid.then(|| k.clone())
                }
                _ => None,
            })
            .collect();

        for key in keys_to_resolve {
            let Value::Json(serde_json::Value::Array(task_ids)) = inputs.get(&key).unwrap().clone() else {
                continue;
            };

            let mut parts = Vec::new();
            for task_id in task_ids {
                let task_id = task_id.as_str().unwrap_or_default();
                match backend.wait(task_id, self.config.prerequisite_ceiling).await? {
                    TaskOutcome::Success(result) => {
                        parts.push(stringify(&result.response));
                    }
                    TaskOutcome::Failed(cause) => {
                        return Err(EngineError::PrerequisiteFailed {
                            step: key.clone(),
                            cause,
                        });
                    }
                }
            }
            inputs.insert(key, Value::string(parts.join("")));
        }

        Ok(())
    }

    /// Phase 3 — dispatch to a built-in operation or the prompt executor,
    /// racing a soft-deadline timer that only logs (never cancels).
    async fn execute_with_soft_deadline(
        &self,
        pipeline_key: &str,
        inputs: &HashMap<String, Value>,
        job: &TaskJob,
    ) -> Result<serde_json::Value, EngineError> {
        let work = self.execute_step(pipeline_key, inputs, job);
        tokio::pin!(work);

        let soft_sleep = tokio::time::sleep(self.config.soft_deadline);
        tokio::pin!(soft_sleep);
        let mut soft_deadline_logged = false;

        loop {
            tokio::select! {
                res = &mut work => return res,
                _ = &mut soft_sleep, if !soft_deadline_logged => {
                    soft_deadline_logged = true;
                    tracing::warn!(step = %job.step.step, "step has exceeded its soft deadline; still running");
                }
            }
        }
    }

    async fn execute_step(
        &self,
        pipeline_key: &str,
        inputs: &HashMap<String, Value>,
        job: &TaskJob,
    ) -> Result<serde_json::Value, EngineError> {
        if let Some(op) = self.registry.build(pipeline_key) {
            op.execute(inputs).await
        } else {
            self.prompt_executor
                .execute(inputs, pipeline_key, job.step.json_object, job.step.domain_id.as_deref())
                .await
        }
    }
}

fn stringify(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{EchoLlmClient, StaticPromptStore};
    use crate::model::{StepConfig, TaskResult};
    use std::sync::Mutex;

    struct FakeBackend {
        outcomes: Mutex<HashMap<String, TaskOutcome>>,
    }

    #[async_trait::async_trait]
    impl TaskBackend for FakeBackend {
        async fn submit(&self, _queue: &str, _job: TaskJob) -> Result<String, EngineError> {
            unimplemented!()
        }
        async fn is_ready(&self, _task_id: &str) -> Result<bool, EngineError> {
            Ok(true)
        }
        async fn result(&self, task_id: &str) -> Result<Option<TaskOutcome>, EngineError> {
            Ok(self.outcomes.lock().unwrap().get(task_id).cloned())
        }
        async fn wait(&self, task_id: &str, _ceiling: Duration) -> Result<TaskOutcome, EngineError> {
            self.outcomes
                .lock()
                .unwrap()
                .get(task_id)
                .cloned()
                .ok_or_else(|| EngineError::PrerequisiteTimeout {
                    step: task_id.to_string(),
                })
        }
    }

    fn worker() -> Worker {
        let registry = Arc::new(Registry::with_default_operations());
        let prompt_executor = Arc::new(PromptExecutor::new(
            Arc::new(StaticPromptStore::new()),
            Arc::new(EchoLlmClient),
        ));
        Worker::new(registry, prompt_executor, WorkerConfig::default())
    }

    fn step_config(pipeline_key: &str, prerequisites: Vec<String>) -> StepConfig {
        StepConfig {
            step: "B".to_string(),
            pipeline_key: pipeline_key.to_string(),
            action: "section".to_string(),
            section_id: None,
            json_object: false,
            domain_id: None,
            queue: "default_queue".to_string(),
            project_name: None,
            prompt_config_src: None,
            database: None,
            bound_inputs: HashMap::new(),
            prerequisites,
        }
    }

    #[tokio::test]
    async fn observes_prerequisite_response_before_executing() {
        let backend = FakeBackend {
            outcomes: Mutex::new(HashMap::from([(
                "task-a".to_string(),
                TaskOutcome::Success(TaskResult {
                    workflow_id: "w1".into(),
                    action: "section".into(),
                    response: serde_json::json!("hello"),
                    version: "v1".into(),
                    webhook_response: false,
                }),
            )])),
        };

        let job = TaskJob {
            workflow_id: "w1".to_string(),
            step: step_config("uppercase", vec!["A".to_string()]),
            sibling_task_ids: HashMap::from([("A".to_string(), "task-a".to_string())]),
            pre_supplied_outputs: HashMap::new(),
        };

        let result = worker().run(&backend, &job).await.unwrap();
        assert_eq!(result.response, serde_json::json!("HELLO"));
    }

    #[tokio::test]
    async fn prerequisite_failure_is_fatal_without_retry_hint() {
        let backend = FakeBackend {
            outcomes: Mutex::new(HashMap::from([(
                "task-a".to_string(),
                TaskOutcome::Failed("boom".to_string()),
            )])),
        };

        let job = TaskJob {
            workflow_id: "w1".to_string(),
            step: step_config("uppercase", vec!["A".to_string()]),
            sibling_task_ids: HashMap::from([("A".to_string(), "task-a".to_string())]),
            pre_supplied_outputs: HashMap::new(),
        };

        let err = worker().run(&backend, &job).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
