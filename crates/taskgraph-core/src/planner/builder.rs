//! StepConfig Builder — turns a `StepDefinition` plus the current set of
//! already-known values into a `StepConfig`, splitting declared inputs into
//! bound values, prerequisites, and optional-unbound slots.

use std::collections::HashMap;

use crate::model::{StepConfig, StepDefinition, TemplateDefaults, Value};

/// Build the `StepConfig` for one step, given the values bound so far
/// (workflow inputs plus already-resolved steps in earlier levels) and the
/// set of step names declared in the template (to distinguish a prerequisite
/// reference from an unresolved name).
pub fn build_step_config(
    step: &StepDefinition,
    defaults: &TemplateDefaults,
    known_values: &HashMap<String, Value>,
    known_step_names: &std::collections::HashSet<String>,
) -> StepConfig {
    let mut bound_inputs = HashMap::new();
    let mut prerequisites = Vec::new();

    for name in &step.inputs {
        if let Some(value) = known_values.get(name) {
            bound_inputs.insert(name.clone(), value.clone());
        } else if known_step_names.contains(name) {
            prerequisites.push(name.clone());
        } else if step.optional_inputs.iter().any(|o| o == name) {
            bound_inputs.insert(name.clone(), Value::string(""));
        }
        // Anything else was already dropped by the planner's soft-drop pass.
    }

    let queue = step
        .queue
        .clone()
        .unwrap_or_else(|| "default_queue".to_string());
    let queue = if step.parallel_task {
        "io_queue".to_string()
    } else {
        queue
    };

    StepConfig {
        step: step.step.clone(),
        pipeline_key: step.pipeline_key.clone(),
        action: step.action.clone(),
        section_id: step.section_id.clone(),
        json_object: step.json_object,
        domain_id: None,
        queue,
        project_name: defaults.template_id.clone(),
        prompt_config_src: defaults.prompt_config_src.clone(),
        database: defaults.database.clone(),
        bound_inputs,
        prerequisites,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn step() -> StepDefinition {
        StepDefinition {
            step: "B".to_string(),
            pipeline_key: "echo".to_string(),
            inputs: vec!["x".to_string(), "A".to_string(), "opt".to_string()],
            optional_inputs: vec!["opt".to_string()],
            action: "section".to_string(),
            section_id: None,
            queue: None,
            parallel_task: false,
            parallel_inputs: Vec::new(),
            parallel_merge: false,
            json_object: false,
            notifications: None,
        }
    }

    #[test]
    fn splits_bound_prerequisite_and_optional() {
        let defaults = TemplateDefaults::default();
        let mut known_values = HashMap::new();
        known_values.insert("x".to_string(), Value::string("hello"));
        let known_step_names: HashSet<String> = ["A".to_string()].into_iter().collect();

        let cfg = build_step_config(&step(), &defaults, &known_values, &known_step_names);

        assert_eq!(cfg.bound_inputs.get("x").and_then(Value::as_str), Some("hello"));
        assert_eq!(cfg.bound_inputs.get("opt").and_then(Value::as_str), Some(""));
        assert_eq!(cfg.prerequisites, vec!["A".to_string()]);
    }

    #[test]
    fn parallel_task_forces_io_queue() {
        let mut s = step();
        s.parallel_task = true;
        s.queue = Some("default_queue".to_string());
        let cfg = build_step_config(&s, &TemplateDefaults::default(), &HashMap::new(), &HashSet::new());
        assert_eq!(cfg.queue, "io_queue");
    }
}
