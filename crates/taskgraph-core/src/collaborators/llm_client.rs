//! LLM Client collaborator — synchronous chat-completion call used by the
//! Prompt-Based Step Executor.

use async_trait::async_trait;

use crate::error::EngineError;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Issue a synchronous completion call, returning the raw text response.
    async fn call_sync(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
        json_object: bool,
        provider: Option<&str>,
    ) -> Result<String, EngineError>;
}

/// HTTP-backed LLM client targeting an Anthropic-compatible Messages API,
/// the same wire shape the platform's own agent caller speaks.
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn call_sync(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
        json_object: bool,
        _provider: Option<&str>,
    ) -> Result<String, EngineError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [{"role": "user", "content": prompt}],
        });
        if json_object {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        tracing::info!(%model, url = %url, "calling llm provider");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::StepFailed(format!("llm request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::StepFailed(format!("llm response unreadable: {e}")))?;

        if !status.is_success() {
            return Err(EngineError::StepFailed(format!(
                "llm provider returned {status}: {text}"
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| EngineError::StepFailed(format!("llm response not json: {e}")))?;

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|arr| {
                arr.iter()
                    .filter_map(|block| {
                        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                            block.get("text").and_then(|t| t.as_str()).map(str::to_string)
                        } else {
                            None
                        }
                    })
                    .reduce(|a, b| format!("{a}\n{b}"))
            })
            .unwrap_or_default();

        Ok(content)
    }
}

/// Deterministic test double that echoes its prompt back, optionally wrapped
/// as JSON. Used for tests that exercise the dispatch path without a real
/// provider.
pub struct EchoLlmClient;

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn call_sync(
        &self,
        prompt: &str,
        _model: &str,
        _temperature: f64,
        _max_tokens: u32,
        json_object: bool,
        _provider: Option<&str>,
    ) -> Result<String, EngineError> {
        if json_object {
            Ok(serde_json::json!({ "output": prompt }).to_string())
        } else {
            Ok(prompt.to_string())
        }
    }
}
