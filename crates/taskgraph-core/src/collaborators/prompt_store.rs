//! Prompt Store collaborator — resolves a `pipeline_key` plus variables into
//! a formatted prompt and its per-prompt model configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A prompt plus the model/provider defaults that travel with it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptBundle {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub provider: Option<String>,
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn get_formatted_prompt_and_config(
        &self,
        pipeline_key: &str,
        variables: &HashMap<String, serde_json::Value>,
        domain_id: Option<&str>,
    ) -> Result<PromptBundle, EngineError>;
}

/// Formats `{name}` placeholders in a template string from the variables map.
fn format_template(template: &str, variables: &HashMap<String, serde_json::Value>) -> String {
    let mut out = template.to_string();
    for (k, v) in variables {
        let rendered = match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&format!("{{{}}}", k), &rendered);
    }
    out
}

/// HTTP-backed prompt store, reaching a remote template repository keyed by
/// name and optional domain/label.
pub struct HttpPromptStore {
    client: reqwest::Client,
    base_url: String,
    label: String,
}

impl HttpPromptStore {
    pub fn new(base_url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into(),
            label: label.into(),
        }
    }
}

#[async_trait]
impl PromptStore for HttpPromptStore {
    async fn get_formatted_prompt_and_config(
        &self,
        pipeline_key: &str,
        variables: &HashMap<String, serde_json::Value>,
        domain_id: Option<&str>,
    ) -> Result<PromptBundle, EngineError> {
        let url = format!(
            "{}/prompts/{}",
            self.base_url.trim_end_matches('/'),
            pipeline_key
        );

        tracing::info!(pipeline_key, label = %self.label, "fetching prompt bundle");

        let response = self
            .client
            .get(&url)
            .query(&[("label", self.label.as_str())])
            .query(&[("domain_id", domain_id.unwrap_or(""))])
            .send()
            .await
            .map_err(|e| EngineError::StepFailed(format!("prompt store request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::StepFailed(format!(
                "prompt store returned {}",
                response.status()
            )));
        }

        let mut bundle: PromptBundle = response
            .json()
            .await
            .map_err(|e| EngineError::StepFailed(format!("prompt store response invalid: {e}")))?;

        bundle.prompt = format_template(&bundle.prompt, variables);
        Ok(bundle)
    }
}

/// Deterministic in-memory prompt store, used by tests and the CLI's
/// offline `validate` path.
#[derive(Default)]
pub struct StaticPromptStore {
    prompts: HashMap<String, PromptBundle>,
    pub calls: std::sync::Mutex<Vec<(String, HashMap<String, serde_json::Value>)>>,
}

impl StaticPromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, pipeline_key: impl Into<String>, bundle: PromptBundle) -> Self {
        self.prompts.insert(pipeline_key.into(), bundle);
        self
    }
}

#[async_trait]
impl PromptStore for StaticPromptStore {
    async fn get_formatted_prompt_and_config(
        &self,
        pipeline_key: &str,
        variables: &HashMap<String, serde_json::Value>,
        _domain_id: Option<&str>,
    ) -> Result<PromptBundle, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((pipeline_key.to_string(), variables.clone()));

        let mut bundle = self
            .prompts
            .get(pipeline_key)
            .cloned()
            .unwrap_or(PromptBundle {
                prompt: format!("{{{}}}", pipeline_key),
                ..Default::default()
            });
        bundle.prompt = format_template(&bundle.prompt, variables);
        Ok(bundle)
    }
}
