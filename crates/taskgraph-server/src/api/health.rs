//! `GET /health` — submits a trivial echo task and reports its state;
//! functions as a liveness probe that exercises the dispatch path itself,
//! not just process uptime.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use taskgraph_core::engine::TaskJob;
use taskgraph_core::error::EngineError;
use taskgraph_core::model::{StepConfig, TaskOutcome, Value};
use taskgraph_core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, EngineError> {
    let step = StepConfig {
        step: "health_check".to_string(),
        pipeline_key: "echo".to_string(),
        action: "section".to_string(),
        section_id: None,
        json_object: false,
        domain_id: None,
        queue: "default_queue".to_string(),
        project_name: None,
        prompt_config_src: None,
        database: None,
        bound_inputs: HashMap::from([("ping".to_string(), Value::string("pong"))]),
        prerequisites: Vec::new(),
    };

    let job = TaskJob {
        workflow_id: "health".to_string(),
        step,
        sibling_task_ids: HashMap::new(),
        pre_supplied_outputs: HashMap::new(),
    };

    let task_id = state.backend.submit("default_queue", job).await?;
    let outcome = state.backend.wait(&task_id, Duration::from_secs(10)).await?;

    let status = match outcome {
        TaskOutcome::Success(_) => "ok",
        TaskOutcome::Failed(_) => "degraded",
    };

    Ok(Json(serde_json::json!({
        "status": status,
        "task_id": task_id,
        "server": "taskgraph-server",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
