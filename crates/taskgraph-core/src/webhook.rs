//! Webhook Notifier (C3) — posts a JSON payload with Basic-Auth to every
//! configured endpoint on a task's terminal state. One endpoint's failure
//! never affects another's, nor the task's own success/failure status.

use serde::Serialize;

use crate::model::TaskResult;

#[derive(Debug, Clone)]
pub struct WebhookEndpoint {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// The three environment profiles the platform selects between at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookProfile {
    Local,
    Develop,
    Production,
}

impl WebhookProfile {
    pub fn from_env_str(s: &str) -> Self {
        match s {
            "production" => WebhookProfile::Production,
            "develop" => WebhookProfile::Develop,
            _ => WebhookProfile::Local,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub endpoints: Vec<WebhookEndpoint>,
}

impl WebhookConfig {
    /// Builds the endpoint set for `profile` from the conventional
    /// environment variables, matching the platform's `local`/`develop`
    /// (three endpoints: integration, stage, test) vs `production` (one
    /// endpoint) split.
    pub fn from_env(profile: WebhookProfile) -> Self {
        let username = std::env::var("WEBHOOK_USERNAME").unwrap_or_default();
        let password = std::env::var("WEBHOOK_PASSWORD").unwrap_or_default();

        let urls: Vec<String> = match profile {
            WebhookProfile::Production => vec![std::env::var("WEBHOOK_PROD").unwrap_or_default()],
            WebhookProfile::Local | WebhookProfile::Develop => vec![
                std::env::var("WEBHOOK_INTEGRATION").unwrap_or_default(),
                std::env::var("WEBHOOK_STAGE").unwrap_or_default(),
                std::env::var("WEBHOOK_TEST").unwrap_or_default(),
            ],
        };

        let endpoints = urls
            .into_iter()
            .filter(|u| !u.is_empty())
            .map(|url| WebhookEndpoint {
                url,
                username: username.clone(),
                password: password.clone(),
            })
            .collect();

        Self { endpoints }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WebhookContext {
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub session_id: Option<String>,
    pub input_text: Option<String>,
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    /// Fires the success envelope. `workflow_id` substring-matching
    /// `"preprocessing"` omits `result_text`/`references` per the platform's
    /// existing convention.
    pub async fn notify_success(&self, task_id: &str, result: &TaskResult, ctx: &WebhookContext) {
        if !result.webhook_response {
            return;
        }

        let is_preprocessing = result.workflow_id.to_lowercase().contains("preprocessing");

        let result_text = result
            .response
            .get("llm_output")
            .cloned()
            .unwrap_or_else(|| result.response.clone());
        let references = result
            .response
            .get("references")
            .cloned()
            .unwrap_or_else(|| result.response.clone());

        let mut payload = serde_json::json!({
            "workflow_id": result.workflow_id,
            "task_id": task_id,
            "status": "SUCCESS",
            "action": result.action,
            "client_id": ctx.client_id,
            "project_id": ctx.project_id,
            "session_id": ctx.session_id,
            "input_text": ctx.input_text,
            "version": result.version,
        });

        if !is_preprocessing {
            payload["result_text"] = result_text;
            payload["references"] = references;
        }

        self.send(&payload).await;
    }

    pub async fn notify_failure(&self, task_id: &str, workflow_id: &str, action: &str, error: &str, ctx: &WebhookContext) {
        let payload = serde_json::json!({
            "workflow_id": workflow_id,
            "task_id": task_id,
            "status": "FAILURE",
            "action": action,
            "result": error,
            "result_text": error,
            "client_id": ctx.client_id,
            "project_id": ctx.project_id,
            "session_id": ctx.session_id,
            "input_text": ctx.input_text,
        });

        self.send(&payload).await;
    }

    async fn send<T: Serialize>(&self, payload: &T) {
        let body = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "webhook payload is not json-serialisable; skipping delivery");
                return;
            }
        };

        for endpoint in &self.config.endpoints {
            let response = self
                .client
                .post(&endpoint.url)
                .basic_auth(&endpoint.username, Some(&endpoint.password))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match response {
                Ok(r) if r.status().is_success() => {
                    tracing::info!(url = %endpoint.url, "webhook delivered");
                }
                Ok(r) => {
                    tracing::warn!(url = %endpoint.url, status = %r.status(), "webhook endpoint returned non-success");
                }
                Err(e) => {
                    tracing::warn!(url = %endpoint.url, error = %e, "webhook delivery failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_profile_uses_single_endpoint_env_var() {
        std::env::set_var("WEBHOOK_PROD", "https://example.test/hook");
        std::env::set_var("WEBHOOK_USERNAME", "u");
        std::env::set_var("WEBHOOK_PASSWORD", "p");
        let cfg = WebhookConfig::from_env(WebhookProfile::Production);
        assert_eq!(cfg.endpoints.len(), 1);
        assert_eq!(cfg.endpoints[0].url, "https://example.test/hook");
        std::env::remove_var("WEBHOOK_PROD");
    }

    #[test]
    fn empty_endpoint_urls_are_dropped() {
        std::env::remove_var("WEBHOOK_INTEGRATION");
        std::env::remove_var("WEBHOOK_STAGE");
        std::env::remove_var("WEBHOOK_TEST");
        let cfg = WebhookConfig::from_env(WebhookProfile::Local);
        assert!(cfg.endpoints.is_empty());
    }
}
