//! `GET /api/workflow/{workflow_id}/status` — retained as an interface
//! seam: the platform's own router treats this as a placeholder, so this
//! reports the dispatched `(step_name, task_id, status)` rows for the
//! workflow without promising any stronger contract.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use taskgraph_core::error::EngineError;
use taskgraph_core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/workflow/{workflow_id}/status", get(workflow_status))
}

async fn workflow_status(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<serde_json::Value>, EngineError> {
    let records = state.task_store.list_by_workflow(&workflow_id).await?;

    let tasks: Vec<serde_json::Value> = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "step_name": r.step_name,
                "task_id": r.task_id,
                "status": r.status.as_str(),
            })
        })
        .collect();

    let message = format!("{} task(s) recorded for workflow '{workflow_id}'", records.len());

    Ok(Json(serde_json::json!({
        "workflow_id": workflow_id,
        "message": message,
        "status": "ok",
        "tasks": tasks,
    })))
}
