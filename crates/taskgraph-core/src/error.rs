//! Core error type for the orchestrator.
//!
//! `EngineError` distinguishes prerequisite failures from step-body failures
//! at the type level, so retry policy never has to string-match a message.
//! When the `axum` feature is enabled, it also implements `IntoResponse`
//! so it can be used directly as an axum handler error type.

#[derive(Debug, thiserror::Error, Clone)]
pub enum EngineError {
    #[error("planning error: {0}")]
    Planning(String),

    #[error("prerequisite '{step}' failed: {cause}")]
    PrerequisiteFailed { step: String, cause: String },

    #[error("prerequisite '{step}' timed out waiting for completion")]
    PrerequisiteTimeout { step: String },

    #[error("step failed: {0}")]
    StepFailed(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template invalid: {0}")]
    TemplateInvalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

impl EngineError {
    /// Whether the queue backend should retry a task that failed with this error.
    /// Prerequisite failures are not retryable: re-running the same task cannot
    /// change a sibling's outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, EngineError::PrerequisiteFailed { .. })
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for EngineError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, code, message) = match &self {
            EngineError::TemplateNotFound(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_template", msg.clone())
            }
            EngineError::TemplateInvalid(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_template", msg.clone())
            }
            EngineError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            EngineError::Planning(msg) => (StatusCode::BAD_REQUEST, "planning_error", msg.clone()),
            EngineError::Database(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
            EngineError::PrerequisiteFailed { step, cause } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "prerequisite_failed",
                format!("{step}: {cause}"),
            ),
            EngineError::PrerequisiteTimeout { step } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "prerequisite_timeout",
                step.clone(),
            ),
            EngineError::StepFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = serde_json::json!({ "error": code, "details": message });
        (status, axum::Json(body)).into_response()
    }
}
