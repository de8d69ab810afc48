//! DAG Planner — turns a template's step definitions plus the initial
//! workflow inputs into an ordered list of execution levels.
//!
//! A level is a maximal set of steps whose inputs are already available,
//! either because they were supplied by the caller or because every step
//! that would have produced them was planned in an earlier level.

use std::collections::HashSet;

use crate::model::{StepDefinition, WorkflowTemplate};

pub mod builder;
pub use builder::build_step_config;

/// Levels plus the names of any steps the planner could not place —
/// either because of a cycle or a reference to an unknown name.
#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    pub levels: Vec<Vec<StepDefinition>>,
    pub dropped: Vec<String>,
}

/// Compute execution levels for `template` given the set of names already
/// available in `initial_inputs` (workflow inputs plus template defaults).
///
/// Pure and side-effect free: no I/O, no task submission.
pub fn plan(template: &WorkflowTemplate, initial_inputs: &HashSet<String>) -> PlanOutcome {
    let mut available: HashSet<String> = initial_inputs.clone();
    let mut remaining: Vec<StepDefinition> = template.steps.clone();
    let mut levels = Vec::new();

    loop {
        let (ready, not_ready): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|s| step_is_ready(s, &available));

        if ready.is_empty() {
            if !not_ready.is_empty() {
                let names: Vec<String> = not_ready.iter().map(|s| s.step.clone()).collect();
                tracing::warn!(
                    dropped = ?names,
                    "planner: steps reference inputs that never became available; dropping them"
                );
                return PlanOutcome {
                    levels,
                    dropped: names,
                };
            }
            return PlanOutcome {
                levels,
                dropped: Vec::new(),
            };
        }

        for s in &ready {
            available.insert(s.step.clone());
        }
        levels.push(ready);
        remaining = not_ready;
    }
}

fn step_is_ready(step: &StepDefinition, available: &HashSet<String>) -> bool {
    step.inputs.iter().all(|name| {
        available.contains(name) || step.optional_inputs.iter().any(|o| o == name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepDefinition;

    fn step(name: &str, inputs: &[&str]) -> StepDefinition {
        StepDefinition {
            step: name.to_string(),
            pipeline_key: "echo".to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            optional_inputs: Vec::new(),
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

    fn template(steps: Vec<StepDefinition>) -> WorkflowTemplate {
        WorkflowTemplate {
            defaults: Default::default(),
            steps,
        }
    }

    #[test]
    fn linear_two_step_workflow() {
        let t = template(vec![step("A", &["x"]), step("B", &["A"])]);
        let inputs: HashSet<String> = ["x".to_string()].into_iter().collect();
        let outcome = plan(&t, &inputs);
        assert_eq!(outcome.levels.len(), 2);
        assert_eq!(outcome.levels[0][0].step, "A");
        assert_eq!(outcome.levels[1][0].step, "B");
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn diamond_shape() {
        let t = template(vec![
            step("A", &["x"]),
            step("B", &["x"]),
            step("C", &["x"]),
            step("D", &["A", "B", "C"]),
        ]);
        let inputs: HashSet<String> = ["x".to_string()].into_iter().collect();
        let outcome = plan(&t, &inputs);
        assert_eq!(outcome.levels.len(), 2);
        assert_eq!(outcome.levels[0].len(), 3);
        assert_eq!(outcome.levels[1][0].step, "D");
    }

    #[test]
    fn cycle_is_soft_dropped() {
        let t = template(vec![step("A", &["B"]), step("B", &["A"]), step("C", &["x"])]);
        let inputs: HashSet<String> = ["x".to_string()].into_iter().collect();
        let outcome = plan(&t, &inputs);
        assert_eq!(outcome.levels.len(), 1);
        assert_eq!(outcome.levels[0][0].step, "C");
        let mut dropped = outcome.dropped.clone();
        dropped.sort();
        assert_eq!(dropped, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn optional_input_binds_to_empty_string_not_a_prerequisite() {
        let mut s = step("A", &["present", "missing"]);
        s.optional_inputs = vec!["missing".to_string()];
        let t = template(vec![s]);
        let inputs: HashSet<String> = ["present".to_string()].into_iter().collect();
        let outcome = plan(&t, &inputs);
        assert_eq!(outcome.levels.len(), 1);
        assert!(outcome.dropped.is_empty());
    }
}
