//! Process-wide configuration, resolved once from the environment at
//! startup. Mirrors the platform's own `environment_settings` module: a
//! handful of env vars, defaulted, never re-read after boot.

use std::time::Duration;

use crate::engine::local::BackendConfig;
use crate::webhook::{WebhookConfig, WebhookProfile};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub templates_dir: String,
    pub db_path: String,
    pub prompt_store_url: Option<String>,
    pub prompt_store_label: String,
    pub llm_provider_url: Option<String>,
    pub llm_provider_api_key: Option<String>,
    pub environment: WebhookProfile,
    pub webhook: WebhookConfig,
    pub backend: BackendConfig,
    pub soft_deadline: Duration,
    pub prerequisite_ceiling: Duration,
}

impl EngineConfig {
    /// Resolves every setting from its conventional environment variable,
    /// falling back to values sane enough for local development.
    pub fn from_env() -> Self {
        let environment = WebhookProfile::from_env_str(
            &std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string()),
        );

        Self {
            templates_dir: std::env::var("TASKGRAPH_TEMPLATES_DIR")
                .unwrap_or_else(|_| "templates".to_string()),
            db_path: std::env::var("TASKGRAPH_DB_PATH")
                .unwrap_or_else(|_| "taskgraph.db".to_string()),
            prompt_store_url: std::env::var("PROMPT_STORE_URL").ok(),
            prompt_store_label: std::env::var("PROMPT_STORE_LABEL")
                .unwrap_or_else(|_| "production".to_string()),
            llm_provider_url: std::env::var("LLM_PROVIDER_URL").ok(),
            llm_provider_api_key: std::env::var("LLM_PROVIDER_API_KEY").ok(),
            environment,
            webhook: WebhookConfig::from_env(environment),
            backend: BackendConfig::default(),
            soft_deadline: Duration::from_secs(3600),
            prerequisite_ceiling: Duration::from_secs(1800),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_when_nothing_is_set() {
        std::env::remove_var("TASKGRAPH_TEMPLATES_DIR");
        std::env::remove_var("TASKGRAPH_DB_PATH");
        std::env::remove_var("ENVIRONMENT");
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.templates_dir, "templates");
        assert_eq!(cfg.environment, WebhookProfile::Local);
        assert_eq!(cfg.backend.max_attempts, 3);
    }
}
