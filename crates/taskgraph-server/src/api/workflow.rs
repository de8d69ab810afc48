//! `POST /api/workflow/{template}` and `POST /api/chat/{template}` — both
//! load a template, plan + dispatch it, and return the dispatched task ids.
//! The platform treats the two routes identically; only the URL prefix
//! signals intent to the caller.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use taskgraph_core::engine::DispatchResult;
use taskgraph_core::error::EngineError;
use taskgraph_core::model::{Value, WorkflowTemplate};
use taskgraph_core::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/workflow/{template}", post(start_workflow))
        .route("/api/chat/{template}", post(start_workflow))
}

#[derive(Debug, Deserialize)]
struct StartWorkflowRequest {
    #[serde(default)]
    input: serde_json::Map<String, serde_json::Value>,
}

async fn start_workflow(
    State(state): State<AppState>,
    Path(template_name): Path<String>,
    Json(body): Json<StartWorkflowRequest>,
) -> Result<Json<serde_json::Value>, EngineError> {
    let template = load_template(&state.config.templates_dir, &template_name)?;

    let workflow_id = body
        .input
        .get("workflow_id")
        .and_then(|v| v.as_str())
        .unwrap_or("default_workflow")
        .to_string();

    let mut initial_inputs: HashMap<String, Value> = HashMap::new();
    for (k, v) in &body.input {
        initial_inputs.insert(k.clone(), Value::Json(v.clone()));
    }

    let result: DispatchResult = state
        .dispatcher
        .dispatch(&workflow_id, &template, initial_inputs, HashMap::new())
        .await?;

    Ok(Json(serde_json::json!({
        "workflow_id": workflow_id,
        "tasks": tasks_response(&template, &result),
    })))
}

fn tasks_response(template: &WorkflowTemplate, result: &DispatchResult) -> Vec<serde_json::Value> {
    template
        .steps
        .iter()
        .filter_map(|step| {
            result.step_task_ids.get(&step.step).map(|task_id| {
                let queue = result
                    .step_queues
                    .get(&step.step)
                    .cloned()
                    .unwrap_or_else(|| "default_queue".to_string());
                serde_json::json!({
                    "step_name": step.step,
                    "pipeline_key": step.pipeline_key,
                    "task_id": task_id,
                    "queue": queue,
                    "status": "PENDING",
                })
            })
        })
        .collect()
}

fn load_template(templates_dir: &str, template_name: &str) -> Result<WorkflowTemplate, EngineError> {
    let path = std::path::Path::new(templates_dir).join(format!("{template_name}.yml"));
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| EngineError::TemplateNotFound(format!("{}: {e}", path.display())))?;
    WorkflowTemplate::from_yaml(&contents)
}
