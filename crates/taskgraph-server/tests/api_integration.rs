//! Integration tests for the taskgraph-server REST surface, exercising the
//! router directly with an in-memory database and a temp templates dir.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use taskgraph_core::db::Database;
use taskgraph_core::state::AppStateInner;
use taskgraph_core::EngineConfig;

async fn test_router(templates_dir: &std::path::Path) -> axum::Router {
    let mut engine = EngineConfig::from_env();
    engine.templates_dir = templates_dir.to_string_lossy().to_string();

    let db = Database::open_in_memory().expect("open in-memory db");
    let state = Arc::new(AppStateInner::new(engine, db).expect("build app state"));

    axum::Router::new()
        .merge(taskgraph_server::api::api_router())
        .with_state(state)
}

fn write_template(dir: &std::path::Path, name: &str, contents: &str) {
    std::fs::write(dir.join(format!("{name}.yml")), contents).unwrap();
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path()).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn starting_unknown_template_returns_422() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/workflow/does-not-exist")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::json!({ "input": {} }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn starting_a_workflow_dispatches_every_step_and_results_resolve() {
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "greet",
        r#"
defaults:
  template_id: greet
steps:
  - step: A
    pipeline_key: uppercase
    inputs: [x]
  - step: B
    pipeline_key: echo
    inputs: [A]
"#,
    );
    let app = test_router(dir.path()).await;

    let start = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/workflow/greet")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "input": { "workflow_id": "wf-1", "x": "hi" } }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(start.status(), StatusCode::OK);
    let body = body_json(start).await;
    assert_eq!(body["workflow_id"], "wf-1");
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);

    let task_b_id = tasks
        .iter()
        .find(|t| t["step_name"] == "B")
        .unwrap()["task_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Give the in-process worker a moment to run both steps.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let result = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/results/{task_b_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(result.status(), StatusCode::OK);
    let body = body_json(result).await;
    assert_eq!(body["result"], serde_json::json!("HI"));

    let status = app
        .oneshot(
            Request::builder()
                .uri("/api/workflow/wf-1/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(status.status(), StatusCode::OK);
    let body = body_json(status).await;
    assert_eq!(body["tasks"].as_array().unwrap().len(), 2);
}
