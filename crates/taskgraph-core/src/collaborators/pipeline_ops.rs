//! Document ingestion collaborators. The algorithms themselves (real
//! parsing, chunking, embedding) are external and out of scope; these
//! traits and their deterministic in-memory implementations exist only so
//! the `parse_document` / `chunk_text` / `embed_chunks` built-in operations
//! (see `executor::registry`) have something real to delegate to.

use async_trait::async_trait;

use crate::error::EngineError;

#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, raw: &str) -> Result<String, EngineError>;
}

#[async_trait]
pub trait Chunker: Send + Sync {
    async fn chunk(&self, text: &str) -> Result<Vec<String>, EngineError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, chunks: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;
}

/// Treats the raw input as already-plain text; a stand-in for a real
/// markdown/PDF/HTML parser.
pub struct PlainTextParser;

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, raw: &str) -> Result<String, EngineError> {
        Ok(raw.to_string())
    }
}

/// Splits text into fixed-size windows; a stand-in for a real semantic
/// chunker.
pub struct FixedSizeChunker {
    pub window: usize,
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self { window: 512 }
    }
}

#[async_trait]
impl Chunker for FixedSizeChunker {
    async fn chunk(&self, text: &str) -> Result<Vec<String>, EngineError> {
        if self.window == 0 {
            return Err(EngineError::StepFailed("chunk window must be > 0".into()));
        }
        Ok(text
            .as_bytes()
            .chunks(self.window)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect())
    }
}

/// Deterministic byte-length-hash embedding; a stand-in for a real
/// embedding model.
pub struct HashEmbedder {
    pub dims: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dims: 8 }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, chunks: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        Ok(chunks
            .iter()
            .map(|c| {
                let mut v = vec![0f32; self.dims];
                for (i, byte) in c.bytes().enumerate() {
                    v[i % self.dims] += byte as f32;
                }
                v
            })
            .collect())
    }
}
