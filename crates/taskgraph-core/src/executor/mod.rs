//! Step Registry (C1), Prompt-Based Step Executor (C2), and the Task Worker
//! (C4) that ties prerequisite resolution, input normalisation, step
//! execution and result emission together.

pub mod prompt;
pub mod registry;
pub mod worker;

pub use prompt::{preprocess_entity_normalization, PromptExecutor};
pub use registry::{Operation, Registry};
pub use worker::{Worker, WorkerConfig};
