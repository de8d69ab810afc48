//! `taskgraph workflow` — validate and dispatch YAML-defined workflow templates.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use taskgraph_core::model::{TaskOutcome, Value, WorkflowTemplate};
use taskgraph_core::planner;
use taskgraph_core::AppState;

/// Validate a workflow template file without dispatching it.
///
/// Plans the template against its own step names as the available input
/// set, so validation catches unknown-reference and cycle errors the same
/// way the dispatcher's planning pass would.
pub async fn validate(template_file: &str) -> Result<(), String> {
    let contents = std::fs::read_to_string(template_file)
        .map_err(|e| format!("failed to read '{}': {}", template_file, e))?;
    let template = WorkflowTemplate::from_yaml(&contents).map_err(|e| e.to_string())?;

    let declared_inputs: HashSet<String> = template
        .steps
        .iter()
        .flat_map(|s| s.inputs.iter().chain(s.optional_inputs.iter()).cloned())
        .collect();
    let outcome = planner::plan(&template, &declared_inputs);

    println!(
        "✅ Template '{}' is valid",
        template.defaults.template_id.as_deref().unwrap_or(template_file)
    );
    println!("   Steps: {}", template.steps.len());
    println!("   Levels: {}", outcome.levels.len());

    for (i, level) in outcome.levels.iter().enumerate() {
        let names: Vec<&str> = level.iter().map(|s| s.step.as_str()).collect();
        println!("   {}. {}", i + 1, names.join(", "));
    }

    if !outcome.dropped.is_empty() {
        println!(
            "   ⚠ {} step(s) reference inputs that never become available: {}",
            outcome.dropped.len(),
            outcome.dropped.join(", ")
        );
    }

    Ok(())
}

/// Dispatch a named template (looked up under the configured templates dir).
pub async fn start(
    state: &AppState,
    template_name: &str,
    workflow_id: Option<String>,
    inputs: Vec<(String, String)>,
    wait: bool,
) -> Result<(), String> {
    let path = std::path::Path::new(&state.config.templates_dir).join(format!("{template_name}.yml"));
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| format!("failed to read template '{}': {}", path.display(), e))?;
    let template = WorkflowTemplate::from_yaml(&contents).map_err(|e| e.to_string())?;

    let workflow_id = workflow_id.unwrap_or_else(|| format!("wf-{}", uuid_suffix()));

    let initial_inputs: HashMap<String, Value> = inputs
        .into_iter()
        .map(|(k, v)| (k, Value::string(v)))
        .collect();

    println!("📄 Dispatching '{}' as workflow '{}'", template_name, workflow_id);

    let result = state
        .dispatcher
        .dispatch(&workflow_id, &template, initial_inputs, HashMap::new())
        .await
        .map_err(|e| e.to_string())?;

    for (step, task_id) in &result.step_task_ids {
        println!("   {} -> {}", step, task_id);
    }
    if !result.dropped.is_empty() {
        println!("   ⚠ dropped: {}", result.dropped.join(", "));
    }

    if wait {
        for (step, task_id) in &result.step_task_ids {
            let outcome = state
                .backend
                .wait(task_id, Duration::from_secs(state.config.soft_deadline.as_secs()))
                .await
                .map_err(|e| e.to_string())?;
            match outcome {
                TaskOutcome::Success(r) => println!("   {} ✅ {}", step, r.response),
                TaskOutcome::Failed(e) => println!("   {} ❌ {}", step, e),
            }
        }
    }

    Ok(())
}

fn uuid_suffix() -> String {
    uuid::Uuid::new_v4().to_string()
}
