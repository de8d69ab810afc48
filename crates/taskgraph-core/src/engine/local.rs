//! `LocalTaskBackend` — an in-process, multi-queue worker pool realising the
//! `TaskBackend` contract without an external broker. One Tokio task per
//! queue name pulls task-ids in FIFO order; retry and deadline policy are
//! enforced here, around calls into the `Worker` (C4).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::engine::{TaskBackend, TaskJob};
use crate::error::EngineError;
use crate::executor::Worker;
use crate::model::{TaskOutcome, TaskStatus};
use crate::store::TaskStore;
use crate::webhook::{WebhookContext, WebhookNotifier};

/// Retry/deadline policy for the local backend. Distinct from the broader
/// process-wide `EngineConfig` assembled from environment variables at
/// startup (see `config.rs`).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub max_attempts: u32,
    pub hard_deadline: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            hard_deadline: Duration::from_secs(7200),
        }
    }
}

struct Inner {
    worker: Worker,
    task_store: Option<TaskStore>,
    notifier: Option<Arc<WebhookNotifier>>,
    config: BackendConfig,
    jobs: Mutex<HashMap<String, TaskJob>>,
    outcomes: Mutex<HashMap<String, watch::Sender<Option<TaskOutcome>>>>,
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<String>>>,
}

#[derive(Clone)]
pub struct LocalTaskBackend {
    inner: Arc<Inner>,
}

impl LocalTaskBackend {
    pub fn new(
        worker: Worker,
        task_store: Option<TaskStore>,
        notifier: Option<Arc<WebhookNotifier>>,
        config: BackendConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                worker,
                task_store,
                notifier,
                config,
                jobs: Mutex::new(HashMap::new()),
                outcomes: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn sender_for_queue(&self, queue: &str) -> mpsc::UnboundedSender<String> {
        let mut queues = self.inner.queues.lock().unwrap();
        if let Some(tx) = queues.get(queue) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        queues.insert(queue.to_string(), tx.clone());
        let backend = self.clone();
        let queue_name = queue.to_string();
        tokio::spawn(async move { backend.run_queue(queue_name, rx).await });
        tx
    }

    async fn run_queue(self, queue: String, mut rx: mpsc::UnboundedReceiver<String>) {
        while let Some(task_id) = rx.recv().await {
            tracing::debug!(queue = %queue, task_id, "picked up task");
            self.execute_with_retry(&task_id).await;
        }
    }

    async fn execute_with_retry(&self, task_id: &str) {
        let job = {
            let jobs = self.inner.jobs.lock().unwrap();
            match jobs.get(task_id).cloned() {
                Some(j) => j,
                None => {
                    tracing::error!(task_id, "no job recorded for task id");
                    return;
                }
            }
        };

        self.set_status(task_id, TaskStatus::Running, None, None).await;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                self.inner.config.hard_deadline,
                self.inner.worker.run(self, &job),
            )
            .await;

            match outcome {
                Ok(Ok(result)) => {
                    self.complete_success(task_id, &job, result).await;
                    return;
                }
                Ok(Err(e)) => {
                    if e.is_retryable() && attempt < self.inner.config.max_attempts {
                        tracing::warn!(task_id, attempt, error = %e, "step failed, retrying");
                        continue;
                    }
                    self.complete_failure(task_id, &job, e.to_string()).await;
                    return;
                }
                Err(_elapsed) => {
                    self.complete_timeout(task_id, &job).await;
                    return;
                }
            }
        }
    }

    async fn complete_success(&self, task_id: &str, job: &TaskJob, result: crate::model::TaskResult) {
        self.set_status(
            task_id,
            TaskStatus::Success,
            Some(result.response.clone()),
            None,
        )
        .await;

        if let Some(tx) = self.inner.outcomes.lock().unwrap().get(task_id) {
            let _ = tx.send(Some(TaskOutcome::Success(result.clone())));
        }

        if let Some(notifier) = &self.inner.notifier {
            let ctx = webhook_context(job, Some(&result.response));
            notifier.notify_success(task_id, &result, &ctx).await;
        }
    }

    async fn complete_failure(&self, task_id: &str, job: &TaskJob, error: String) {
        self.set_status(task_id, TaskStatus::Failed, None, Some(error.clone())).await;

        if let Some(tx) = self.inner.outcomes.lock().unwrap().get(task_id) {
            let _ = tx.send(Some(TaskOutcome::Failed(error.clone())));
        }

        if let Some(notifier) = &self.inner.notifier {
            if job.step.section_id.is_some() {
                let ctx = webhook_context(job, None);
                notifier
                    .notify_failure(task_id, &job.workflow_id, &job.step.action, &error, &ctx)
                    .await;
            }
        }
    }

    async fn complete_timeout(&self, task_id: &str, job: &TaskJob) {
        let msg = "task exceeded hard deadline".to_string();
        self.set_status(task_id, TaskStatus::TimedOut, None, Some(msg.clone())).await;

        if let Some(tx) = self.inner.outcomes.lock().unwrap().get(task_id) {
            let _ = tx.send(Some(TaskOutcome::Failed(msg.clone())));
        }

        if let Some(notifier) = &self.inner.notifier {
            if job.step.section_id.is_some() {
                let ctx = webhook_context(job, None);
                notifier
                    .notify_failure(task_id, &job.workflow_id, &job.step.action, &msg, &ctx)
                    .await;
            }
        }
    }

    async fn set_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        result_json: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        if let Some(store) = &self.inner.task_store {
            if let Err(e) = store.update_status(task_id, status, result_json, error).await {
                tracing::warn!(task_id, error = %e, "failed to persist task status");
            }
        }
    }
}

/// Builds a webhook's correlation fields from a job's bound inputs, falling
/// back to the step's response body when a name isn't present in the inputs
/// (mirrors the original's `kwargs.get(...) or retval.get(...) or inputs.get(...)`
/// fallback chain).
fn webhook_context(job: &TaskJob, response: Option<&serde_json::Value>) -> WebhookContext {
    let field = |key: &str| -> Option<String> {
        job.step
            .bound_inputs
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                response
                    .and_then(|r| r.get(key))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
    };

    WebhookContext {
        client_id: field("client_id"),
        project_id: field("project_id"),
        session_id: field("session_id"),
        input_text: field("input_text"),
    }
}

#[async_trait]
impl TaskBackend for LocalTaskBackend {
    async fn submit(&self, queue: &str, job: TaskJob) -> Result<String, EngineError> {
        let task_id = uuid::Uuid::new_v4().to_string();

        let (tx, _rx) = watch::channel(None);
        self.inner.outcomes.lock().unwrap().insert(task_id.clone(), tx);
        self.inner.jobs.lock().unwrap().insert(task_id.clone(), job.clone());

        if let Some(store) = &self.inner.task_store {
            store
                .insert_pending(&task_id, &job.workflow_id, &job.step.step, &job.step.pipeline_key, queue)
                .await?;
        }

        let sender = self.sender_for_queue(queue);
        sender
            .send(task_id.clone())
            .map_err(|_| EngineError::StepFailed(format!("queue '{queue}' is no longer accepting tasks")))?;

        Ok(task_id)
    }

    async fn is_ready(&self, task_id: &str) -> Result<bool, EngineError> {
        let outcomes = self.inner.outcomes.lock().unwrap();
        match outcomes.get(task_id) {
            Some(tx) => Ok(tx.borrow().is_some()),
            None => Err(EngineError::NotFound(task_id.to_string())),
        }
    }

    async fn result(&self, task_id: &str) -> Result<Option<TaskOutcome>, EngineError> {
        let outcomes = self.inner.outcomes.lock().unwrap();
        match outcomes.get(task_id) {
            Some(tx) => Ok(tx.borrow().clone()),
            None => Err(EngineError::NotFound(task_id.to_string())),
        }
    }

    async fn wait(&self, task_id: &str, ceiling: Duration) -> Result<TaskOutcome, EngineError> {
        let mut rx = {
            let outcomes = self.inner.outcomes.lock().unwrap();
            outcomes
                .get(task_id)
                .ok_or_else(|| EngineError::NotFound(task_id.to_string()))?
                .subscribe()
        };

        if let Some(outcome) = rx.borrow().clone() {
            return Ok(outcome);
        }

        tokio::time::timeout(ceiling, async {
            loop {
                if rx.changed().await.is_err() {
                    return Err(EngineError::PrerequisiteTimeout {
                        step: task_id.to_string(),
                    });
                }
                if let Some(outcome) = rx.borrow().clone() {
                    return Ok(outcome);
                }
            }
        })
        .await
        .unwrap_or(Err(EngineError::PrerequisiteTimeout {
            step: task_id.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{EchoLlmClient, StaticPromptStore};
    use crate::executor::{PromptExecutor, Registry, Worker, WorkerConfig};
    use crate::model::StepConfig;

    fn backend(config: BackendConfig) -> LocalTaskBackend {
        let registry = Arc::new(Registry::with_default_operations());
        let prompt_executor = Arc::new(PromptExecutor::new(
            Arc::new(StaticPromptStore::new()),
            Arc::new(EchoLlmClient),
        ));
        let worker = Worker::new(registry, prompt_executor, WorkerConfig::default());
        LocalTaskBackend::new(worker, None, None, config)
    }

    fn step(pipeline_key: &str) -> StepConfig {
        StepConfig {
            step: "A".to_string(),
            pipeline_key: pipeline_key.to_string(),
            action: "section".to_string(),
            section_id: None,
            json_object: false,
            domain_id: None,
            queue: "default_queue".to_string(),
            project_name: None,
            prompt_config_src: None,
            database: None,
            bound_inputs: HashMap::from([("x".to_string(), crate::model::Value::string("hi"))]),
            prerequisites: Vec::new(),
        }
    }

    #[tokio::test]
    async fn submitted_task_becomes_ready_and_carries_its_result() {
        let backend = backend(BackendConfig::default());
        let job = TaskJob {
            workflow_id: "w1".to_string(),
            step: step("uppercase"),
            sibling_task_ids: HashMap::new(),
            pre_supplied_outputs: HashMap::new(),
        };

        let task_id = backend.submit("default_queue", job).await.unwrap();
        let outcome = backend.wait(&task_id, Duration::from_secs(5)).await.unwrap();

        match outcome {
            TaskOutcome::Success(result) => assert_eq!(result.response, serde_json::json!("HI")),
            TaskOutcome::Failed(e) => panic!("expected success, got failure: {e}"),
        }
        assert!(backend.is_ready(&task_id).await.unwrap());
    }

    #[tokio::test]
    async fn two_queues_run_independently() {
        let backend = backend(BackendConfig::default());
        let job_a = TaskJob {
            workflow_id: "w1".to_string(),
            step: step("echo"),
            sibling_task_ids: HashMap::new(),
            pre_supplied_outputs: HashMap::new(),
        };
        let job_b = TaskJob {
            workflow_id: "w1".to_string(),
            step: step("echo"),
            sibling_task_ids: HashMap::new(),
            pre_supplied_outputs: HashMap::new(),
        };

        let id_a = backend.submit("queue_a", job_a).await.unwrap();
        let id_b = backend.submit("queue_b", job_b).await.unwrap();

        backend.wait(&id_a, Duration::from_secs(5)).await.unwrap();
        backend.wait(&id_b, Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_task_id_is_not_found() {
        let backend = backend(BackendConfig::default());
        let err = backend.is_ready("does-not-exist").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
