//! Prompt-Based Step Executor (C2) — the fallback path for any `pipeline_key`
//! the Step Registry doesn't recognise: fetch a prompt bundle, substitute
//! variables, call the LLM, optionally parse JSON.

use std::collections::HashMap;
use std::sync::Arc;

use crate::collaborators::{LlmClient, PromptStore};
use crate::error::EngineError;
use crate::model::Value;

const SKIP_SENTINEL: &str = "SkiPeD!!";
const DEFAULT_TEMPERATURE: f64 = 0.0;
const DEFAULT_MAX_TOKENS: u32 = 4000;
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

pub struct PromptExecutor {
    prompt_store: Arc<dyn PromptStore>,
    llm_client: Arc<dyn LlmClient>,
}

impl PromptExecutor {
    pub fn new(prompt_store: Arc<dyn PromptStore>, llm_client: Arc<dyn LlmClient>) -> Self {
        Self {
            prompt_store,
            llm_client,
        }
    }

    /// Runs the full resolution cascade for one prompt-based step.
    pub async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        pipeline_key: &str,
        json_object: bool,
        domain_id: Option<&str>,
    ) -> Result<serde_json::Value, EngineError> {
        if inputs.values().any(Value::contains_skip_sentinel) {
            tracing::info!(pipeline_key, "skip sentinel present; bypassing llm call");
            return Ok(serde_json::json!({ "output": SKIP_SENTINEL }));
        }

        let processed_inputs = if pipeline_key == "entity-normalization" {
            preprocess_entity_normalization(inputs)
        } else {
            inputs.clone()
        };

        let variables: HashMap<String, serde_json::Value> = processed_inputs
            .into_iter()
            .map(|(k, v)| {
                let json = match v {
                    Value::Json(j) => j,
                    Value::TaskRef(r) => serde_json::json!(r.task_id),
                };
                (k, json)
            })
            .collect();

        let bundle = self
            .prompt_store
            .get_formatted_prompt_and_config(pipeline_key, &variables, domain_id)
            .await?;

        let model = bundle.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let temperature = bundle.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let max_tokens = bundle.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let provider = bundle.provider.map(|p| p.to_lowercase());

        let response = self
            .llm_client
            .call_sync(
                &bundle.prompt,
                &model,
                temperature,
                max_tokens,
                json_object,
                provider.as_deref(),
            )
            .await?;

        if json_object {
            Ok(parse_json_with_fallbacks(&response))
        } else {
            Ok(serde_json::Value::String(response))
        }
    }
}

/// Three-tier JSON parse: direct, markdown-fence-stripped, then the
/// substring between the first `{` and the last `}`. Falls back to the raw
/// text if every tier fails — the caller decides how strict to be.
fn parse_json_with_fallbacks(response: &str) -> serde_json::Value {
    if let Ok(v) = serde_json::from_str(response) {
        return v;
    }

    let stripped = strip_markdown_fences(response);
    if let Ok(v) = serde_json::from_str(&stripped) {
        return v;
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str(&response[start..=end]) {
                return v;
            }
        }
    }

    tracing::warn!("llm response could not be parsed as json after all fallbacks; returning raw text");
    serde_json::Value::String(response.to_string())
}

fn strip_markdown_fences(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().trim_end_matches("```").trim().to_string()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().trim_end_matches("```").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reshapes raw `extract_entities`/`extract_relationships` fields into
/// newline-joined summaries before template substitution.
pub fn preprocess_entity_normalization(inputs: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut out = inputs.clone();

    if let Some(entities) = inputs.get("extract_entities").and_then(Value::as_str) {
        out.insert("extract_entities".to_string(), Value::string(entities.trim()));
    }

    if let Some(relationships_raw) = inputs.get("extract_relationships").and_then(Value::as_str) {
        let formatted = parse_relationships(relationships_raw);
        out.insert("extract_relationships".to_string(), Value::string(formatted));
    }

    out
}

/// Parses a raw relationship-extraction response (one `source|target|type`
/// triple per line) into `"source -> target (type)"` lines.
fn parse_relationships(raw: &str) -> String {
    raw.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            match parts.as_slice() {
                [source, target, rel_type] if !source.is_empty() && !target.is_empty() => {
                    Some(format!("{source} -> {target} ({rel_type})"))
                }
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{EchoLlmClient, PromptBundle, StaticPromptStore};

    fn executor_with_prompt(bundle: PromptBundle) -> PromptExecutor {
        let store = Arc::new(StaticPromptStore::new().with_prompt("greet", bundle));
        PromptExecutor::new(store, Arc::new(EchoLlmClient))
    }

    #[tokio::test]
    async fn skip_sentinel_short_circuits() {
        let executor = executor_with_prompt(PromptBundle {
            prompt: "{name}".into(),
            ..Default::default()
        });
        let mut inputs = HashMap::new();
        inputs.insert("name".to_string(), Value::string("SkiPeD!!"));
        let out = executor.execute(&inputs, "greet", false, None).await.unwrap();
        assert_eq!(out, serde_json::json!({ "output": "SkiPeD!!" }));
    }

    #[tokio::test]
    async fn substitutes_variables_and_returns_raw_text() {
        let executor = executor_with_prompt(PromptBundle {
            prompt: "hello {name}".into(),
            ..Default::default()
        });
        let mut inputs = HashMap::new();
        inputs.insert("name".to_string(), Value::string("world"));
        let out = executor.execute(&inputs, "greet", false, None).await.unwrap();
        assert_eq!(out, serde_json::json!("hello world"));
    }

    #[test]
    fn json_fallback_strips_markdown_fences() {
        let response = "```json\n{\"a\": 1}\n```";
        let parsed = parse_json_with_fallbacks(response);
        assert_eq!(parsed, serde_json::json!({"a": 1}));
    }

    #[test]
    fn json_fallback_extracts_braces_substring() {
        let response = "Sure! Here you go: {\"a\": 1} — hope that helps.";
        let parsed = parse_json_with_fallbacks(response);
        assert_eq!(parsed, serde_json::json!({"a": 1}));
    }

    #[test]
    fn json_fallback_returns_raw_text_when_unparseable() {
        let response = "no json here";
        let parsed = parse_json_with_fallbacks(response);
        assert_eq!(parsed, serde_json::json!("no json here"));
    }

    #[test]
    fn entity_normalization_formats_relationships() {
        let mut inputs = HashMap::new();
        inputs.insert(
            "extract_relationships".to_string(),
            Value::string("Alice|Bob|KNOWS\nBob|Carol|MANAGES"),
        );
        let out = preprocess_entity_normalization(&inputs);
        assert_eq!(
            out.get("extract_relationships").and_then(Value::as_str),
            Some("Alice -> Bob (KNOWS)\nBob -> Carol (MANAGES)")
        );
    }
}
