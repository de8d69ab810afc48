//! Step Registry — maps a `pipeline_key` to a built-in operation. Any key
//! not present here is optimistically routed to the Prompt-Based Executor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::{Chunker, DocumentParser, Embedder};
use crate::error::EngineError;
use crate::model::Value;

/// A single built-in operation's entry point. Takes the step's materialised
/// inputs and returns a JSON-serialisable value.
#[async_trait]
pub trait Operation: Send + Sync {
    async fn execute(&self, inputs: &HashMap<String, Value>) -> Result<serde_json::Value, EngineError>;
}

type Factory = Arc<dyn Fn() -> Box<dyn Operation> + Send + Sync>;

/// Static map from `pipeline_key` to operation factory, built once at
/// startup and read-only thereafter.
#[derive(Clone)]
pub struct Registry {
    factories: HashMap<String, Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, pipeline_key: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Operation> + Send + Sync + 'static,
    {
        self.factories.insert(pipeline_key.into(), Arc::new(factory));
    }

    pub fn contains(&self, pipeline_key: &str) -> bool {
        self.factories.contains_key(pipeline_key)
    }

    pub fn build(&self, pipeline_key: &str) -> Option<Box<dyn Operation>> {
        self.factories.get(pipeline_key).map(|f| f())
    }

    /// The built-in catalogue ships with this core: a handful of genuinely
    /// built operations (used directly and by tests) plus thin wrappers
    /// around the document-ingestion collaborator traits. Everything else
    /// falls through to the prompt-based executor.
    pub fn with_default_operations() -> Self {
        let mut registry = Self::new();
        registry.register("echo", || Box::new(EchoOp));
        registry.register("uppercase", || Box::new(UppercaseOp));
        registry.register("concat", || Box::new(ConcatOp));
        registry.register("parse_document", || {
            Box::new(ParseDocumentOp::new(Arc::new(
                crate::collaborators::PlainTextParser,
            )))
        });
        registry.register("chunk_text", || {
            Box::new(ChunkTextOp::new(Arc::new(
                crate::collaborators::FixedSizeChunker::default(),
            )))
        });
        registry.register("embed_chunks", || {
            Box::new(EmbedChunksOp::new(Arc::new(
                crate::collaborators::HashEmbedder::default(),
            )))
        });
        registry
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_default_operations()
    }
}

/// Returns its single input verbatim. Used by tests and as a trivial
/// liveness check.
struct EchoOp;

#[async_trait]
impl Operation for EchoOp {
    async fn execute(&self, inputs: &HashMap<String, Value>) -> Result<serde_json::Value, EngineError> {
        let value = inputs
            .values()
            .next()
            .cloned()
            .unwrap_or_else(|| Value::string(""));
        match value {
            Value::Json(j) => Ok(j),
            Value::TaskRef(r) => Ok(serde_json::json!(r.task_id)),
        }
    }
}

struct UppercaseOp;

#[async_trait]
impl Operation for UppercaseOp {
    async fn execute(&self, inputs: &HashMap<String, Value>) -> Result<serde_json::Value, EngineError> {
        let text = inputs
            .values()
            .find_map(Value::as_str)
            .ok_or_else(|| EngineError::StepFailed("uppercase: no string input".into()))?;
        Ok(serde_json::Value::String(text.to_uppercase()))
    }
}

struct ConcatOp;

#[async_trait]
impl Operation for ConcatOp {
    async fn execute(&self, inputs: &HashMap<String, Value>) -> Result<serde_json::Value, EngineError> {
        let mut keys: Vec<&String> = inputs.keys().collect();
        keys.sort();
        let joined = keys
            .into_iter()
            .filter_map(|k| inputs.get(k).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");
        Ok(serde_json::Value::String(joined))
    }
}

struct ParseDocumentOp {
    parser: Arc<dyn DocumentParser>,
}

impl ParseDocumentOp {
    fn new(parser: Arc<dyn DocumentParser>) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl Operation for ParseDocumentOp {
    async fn execute(&self, inputs: &HashMap<String, Value>) -> Result<serde_json::Value, EngineError> {
        let raw = inputs
            .values()
            .find_map(Value::as_str)
            .ok_or_else(|| EngineError::StepFailed("parse_document: no text input".into()))?;
        let parsed = self.parser.parse(raw).await?;
        Ok(serde_json::Value::String(parsed))
    }
}

struct ChunkTextOp {
    chunker: Arc<dyn Chunker>,
}

impl ChunkTextOp {
    fn new(chunker: Arc<dyn Chunker>) -> Self {
        Self { chunker }
    }
}

#[async_trait]
impl Operation for ChunkTextOp {
    async fn execute(&self, inputs: &HashMap<String, Value>) -> Result<serde_json::Value, EngineError> {
        let text = inputs
            .values()
            .find_map(Value::as_str)
            .ok_or_else(|| EngineError::StepFailed("chunk_text: no text input".into()))?;
        let chunks = self.chunker.chunk(text).await?;
        Ok(serde_json::json!(chunks))
    }
}

struct EmbedChunksOp {
    embedder: Arc<dyn Embedder>,
}

impl EmbedChunksOp {
    fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Operation for EmbedChunksOp {
    async fn execute(&self, inputs: &HashMap<String, Value>) -> Result<serde_json::Value, EngineError> {
        let chunks: Vec<String> = inputs
            .values()
            .find_map(|v| match v {
                Value::Json(serde_json::Value::Array(items)) => Some(
                    items
                        .iter()
                        .filter_map(|i| i.as_str().map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .ok_or_else(|| EngineError::StepFailed("embed_chunks: no chunk list input".into()))?;
        let vectors = self.embedder.embed(&chunks).await?;
        Ok(serde_json::json!(vectors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_sole_input() {
        let registry = Registry::with_default_operations();
        let op = registry.build("echo").unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), Value::string("hello"));
        let out = op.execute(&inputs).await.unwrap();
        assert_eq!(out, serde_json::json!("hello"));
    }

    #[tokio::test]
    async fn uppercase_uppercases() {
        let registry = Registry::with_default_operations();
        let op = registry.build("uppercase").unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), Value::string("hello"));
        let out = op.execute(&inputs).await.unwrap();
        assert_eq!(out, serde_json::json!("HELLO"));
    }

    #[test]
    fn unknown_key_is_not_registered() {
        let registry = Registry::with_default_operations();
        assert!(!registry.contains("some-prompt-name"));
    }
}
