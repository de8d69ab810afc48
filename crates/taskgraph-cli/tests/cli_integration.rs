//! Integration tests for the taskgraph-cli commands.
//!
//! These exercise the same code paths as the binary — `AppStateInner`
//! and the planner/dispatcher directly — using in-memory SQLite and a
//! temp templates directory for isolation.

use std::collections::HashSet;
use std::sync::Arc;

use taskgraph_core::db::Database;
use taskgraph_core::model::WorkflowTemplate;
use taskgraph_core::planner;
use taskgraph_core::state::AppStateInner;
use taskgraph_core::EngineConfig;

async fn test_state(templates_dir: &std::path::Path) -> taskgraph_core::AppState {
    let mut config = EngineConfig::from_env();
    config.templates_dir = templates_dir.to_string_lossy().to_string();
    let db = Database::open_in_memory().expect("open in-memory db");
    Arc::new(AppStateInner::new(config, db).expect("build app state"))
}

fn write_template(dir: &std::path::Path, name: &str, contents: &str) {
    std::fs::write(dir.join(format!("{name}.yml")), contents).unwrap();
}

#[tokio::test]
async fn validate_reports_levels_for_a_valid_template() {
    let contents = r#"
defaults:
  template_id: demo
steps:
  - step: A
    pipeline_key: uppercase
    inputs: [x]
  - step: B
    pipeline_key: echo
    inputs: [A]
"#;
    let template = WorkflowTemplate::from_yaml(contents).unwrap();
    let declared: HashSet<String> = template
        .steps
        .iter()
        .flat_map(|s| s.inputs.iter().cloned())
        .collect();
    let outcome = planner::plan(&template, &declared);

    assert_eq!(outcome.levels.len(), 2);
    assert!(outcome.dropped.is_empty());
}

#[tokio::test]
async fn validate_surfaces_dropped_steps_for_a_cycle() {
    let contents = r#"
defaults:
  template_id: broken
steps:
  - step: A
    pipeline_key: echo
    inputs: [B]
  - step: B
    pipeline_key: echo
    inputs: [A]
"#;
    let template = WorkflowTemplate::from_yaml(contents).unwrap();
    let outcome = planner::plan(&template, &HashSet::new());

    assert!(outcome.levels.is_empty());
    let mut dropped = outcome.dropped.clone();
    dropped.sort();
    assert_eq!(dropped, vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn start_dispatches_every_step_and_results_resolve() {
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
    inputs: [name]
  - step: B
    pipeline_key: echo
    inputs: [A]
"#,
    );

    let state = test_state(dir.path()).await;
    let path = dir.path().join("greet.yml");
    let template = WorkflowTemplate::from_yaml(&std::fs::read_to_string(path).unwrap()).unwrap();

    let mut inputs = std::collections::HashMap::new();
    inputs.insert(
        "name".to_string(),
        taskgraph_core::model::Value::string("hi"),
    );

    let result = state
        .dispatcher
        .dispatch("wf-cli-1", &template, inputs, std::collections::HashMap::new())
        .await
        .unwrap();

    assert_eq!(result.step_task_ids.len(), 2);

    let task_b = result.step_task_ids.get("B").unwrap();
    let outcome = state
        .backend
        .wait(task_b, std::time::Duration::from_secs(5))
        .await
        .unwrap();

    match outcome {
        taskgraph_core::model::TaskOutcome::Success(r) => {
            assert_eq!(r.response, serde_json::json!("HI"))
        }
        taskgraph_core::model::TaskOutcome::Failed(e) => panic!("expected success: {e}"),
    }
}
