//! Shared application state: the one place that wires the Step Registry,
//! Prompt-Based Executor, Task Engine and Webhook Notifier collaborators
//! together behind the `TaskBackend` seam, built once at process startup.

use std::sync::Arc;

use crate::collaborators::{
    EchoLlmClient, HttpLlmClient, HttpPromptStore, LlmClient, PromptStore, StaticPromptStore,
};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::engine::{Dispatcher, LocalTaskBackend, TaskBackend};
use crate::error::EngineError;
use crate::executor::{PromptExecutor, Registry, Worker, WorkerConfig};
use crate::store::{ChatHistoryProvider, SqliteChatHistoryProvider, TaskStore};
use crate::webhook::WebhookNotifier;

/// Shared state accessible by all API handlers and the CLI.
pub struct AppStateInner {
    pub config: EngineConfig,
    pub db: Database,
    pub task_store: TaskStore,
    pub chat_history_provider: Arc<dyn ChatHistoryProvider>,
    pub backend: Arc<dyn TaskBackend>,
    pub dispatcher: Dispatcher,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(config: EngineConfig, db: Database) -> Result<Self, EngineError> {
        let task_store = TaskStore::new(db.clone());
        let chat_history_provider: Arc<dyn ChatHistoryProvider> =
            Arc::new(SqliteChatHistoryProvider::new(db.clone()));

        let prompt_store: Arc<dyn PromptStore> = match &config.prompt_store_url {
            Some(url) => Arc::new(HttpPromptStore::new(url.clone(), config.prompt_store_label.clone())),
            None => Arc::new(StaticPromptStore::new()),
        };

        let llm_client: Arc<dyn LlmClient> = match (&config.llm_provider_url, &config.llm_provider_api_key) {
            (Some(url), Some(key)) => Arc::new(HttpLlmClient::new(url.clone(), key.clone())),
            _ => Arc::new(EchoLlmClient),
        };

        let registry = Arc::new(Registry::with_default_operations());
        let prompt_executor = Arc::new(PromptExecutor::new(prompt_store, llm_client));
        let worker_config = WorkerConfig {
            prerequisite_ceiling: config.prerequisite_ceiling,
            soft_deadline: config.soft_deadline,
        };
        let worker = Worker::new(registry, prompt_executor, worker_config);

        let webhook_notifier = Arc::new(WebhookNotifier::new(config.webhook.clone()));

        let backend: Arc<dyn TaskBackend> = Arc::new(LocalTaskBackend::new(
            worker,
            Some(task_store.clone()),
            Some(webhook_notifier),
            config.backend.clone(),
        ));

        let dispatcher = Dispatcher::new(backend.clone());

        Ok(Self {
            config,
            db,
            task_store,
            chat_history_provider,
            backend,
            dispatcher,
        })
    }
}
