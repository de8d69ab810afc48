//! Distributed Task Engine — the queue-backend collaborator interface (C6's
//! transport seam) plus the in-process implementation this core ships.

pub mod dispatcher;
pub mod local;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::model::{StepConfig, TaskOutcome, Value};

pub use dispatcher::{DispatchResult, Dispatcher};
pub use local::LocalTaskBackend;

/// One unit of dispatch handed to a worker: the step to run plus the
/// sibling task-ids it may need to wait on.
#[derive(Debug, Clone)]
pub struct TaskJob {
    pub workflow_id: String,
    pub step: StepConfig,
    pub sibling_task_ids: HashMap<String, String>,
    pub pre_supplied_outputs: HashMap<String, Value>,
}

/// The distributed queue collaborator. `submit`/`result`/`is_ready` form a
/// minimal queue contract; `wait` is the bounded-poll primitive the Task
/// Worker's prerequisite-resolution phase uses to block on a sibling.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn submit(&self, queue: &str, job: TaskJob) -> Result<String, EngineError>;
    async fn is_ready(&self, task_id: &str) -> Result<bool, EngineError>;
    async fn result(&self, task_id: &str) -> Result<Option<TaskOutcome>, EngineError>;
    async fn wait(&self, task_id: &str, ceiling: Duration) -> Result<TaskOutcome, EngineError>;
}
