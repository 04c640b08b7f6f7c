use crate::models::WorkflowState;

/// Predicate deciding whether a conditional task should execute.
///
/// Conditions are opaque strings on [`crate::models::TaskDefinition`]; the
/// state store evaluates them against the current workflow state when a
/// conditional task becomes ready. Implementations must not mutate state and
/// must not block.
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate `condition` against a workflow state snapshot
    fn evaluate(&self, condition: &str, state: &WorkflowState) -> bool;
}

/// Default condition heuristic: the condition holds iff any completed task id
/// appears in the condition string.
///
/// This matches condition forms like `"analyze == 'completed'"` or
/// `"analyze.output.success"` without parsing them. A richer evaluator can be
/// substituted on the state store without changing any executor contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletedReference;

impl ConditionEvaluator for CompletedReference {
    fn evaluate(&self, condition: &str, state: &WorkflowState) -> bool {
        state
            .completed_tasks
            .iter()
            .any(|id| condition.contains(id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskDefinition, WorkflowDefinition};

    fn state_with_completed(completed: &[&str]) -> WorkflowState {
        let tasks = completed
            .iter()
            .map(|id| TaskDefinition::new(*id, "task"))
            .collect();
        let workflow = WorkflowDefinition::new("wf", "test", tasks);
        let mut state = WorkflowState::new(&workflow);
        for id in completed {
            state.pending_tasks.retain(|p| p != id);
            state.completed_tasks.push((*id).to_string());
        }
        state
    }

    #[test]
    fn test_condition_references_completed_task() {
        let state = state_with_completed(&["analyze"]);
        let evaluator = CompletedReference;
        assert!(evaluator.evaluate("analyze == 'completed'", &state));
        assert!(evaluator.evaluate("analyze.output.success", &state));
    }

    #[test]
    fn test_condition_without_completed_reference() {
        let state = state_with_completed(&["analyze"]);
        let evaluator = CompletedReference;
        assert!(!evaluator.evaluate("report == 'completed'", &state));
    }

    #[test]
    fn test_condition_with_no_completions() {
        let state = state_with_completed(&[]);
        let evaluator = CompletedReference;
        assert!(!evaluator.evaluate("anything", &state));
    }
}
