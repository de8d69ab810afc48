//! Taskgraph Core — transport-agnostic domain logic for the workflow
//! orchestrator.
//!
//! This crate contains the DAG planner, step registry, prompt-based step
//! executor, distributed task engine and webhook notifier. It has **no HTTP
//! framework dependency** by default, making it suitable for use in:
//!
//! - HTTP servers (via `taskgraph-server`)
//! - CLI tools (via `taskgraph-cli`)
//! - Any other process that wants to dispatch workflow templates
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `EngineError` for use in axum handlers.

pub mod collaborators;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod executor;
pub mod model;
pub mod planner;
pub mod state;
pub mod store;
pub mod webhook;

pub use config::EngineConfig;
pub use db::Database;
pub use error::EngineError;
pub use state::{AppState, AppStateInner};
