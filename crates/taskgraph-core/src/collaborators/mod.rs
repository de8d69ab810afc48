//! Trait interfaces for the external systems the core consumes, plus the
//! minimal concrete implementations (HTTP-backed, and deterministic test
//! doubles) needed to exercise the registry and prompt executor end to end.
//! Document parsing, chunking and embedding algorithms themselves are out
//! of scope: only the seam they plug into is owned here.

pub mod llm_client;
pub mod pipeline_ops;
pub mod prompt_store;

pub use llm_client::{EchoLlmClient, HttpLlmClient, LlmClient};
pub use pipeline_ops::{Chunker, DocumentParser, Embedder, FixedSizeChunker, HashEmbedder, PlainTextParser};
pub use prompt_store::{HttpPromptStore, PromptBundle, PromptStore, StaticPromptStore};
