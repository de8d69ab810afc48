//! `GET /api/results/{task_id}` — 202 while running, 500 on failure, 200
//! with the response body on success.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use taskgraph_core::error::EngineError;
use taskgraph_core::model::TaskOutcome;
use taskgraph_core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/results/{task_id}", get(get_result))
}

async fn get_result(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Response, EngineError> {
    match state.backend.result(&task_id).await? {
        None => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "task_id": task_id, "status": "PENDING" })),
        )
            .into_response()),
        Some(TaskOutcome::Success(result)) => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "task_id": task_id, "result": result.response })),
        )
            .into_response()),
        Some(TaskOutcome::Failed(cause)) => Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "task_id": task_id, "status": "FAILURE", "error": cause })),
        )
            .into_response()),
    }
}
