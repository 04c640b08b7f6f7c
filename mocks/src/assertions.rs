//! Custom assertion helpers for orchestration tests
//!
//! Provides specialized assertions for:
//! - Terminal task statuses with clear error messages
//! - Set-membership invariants on workflow state
//! - Router load drain checks

use workflow_core::models::{TaskStatus, WorkflowState};
use workflow_core::TaskRouter;

/// Assert the four membership lists are pairwise disjoint
pub fn assert_disjoint_sets(state: &WorkflowState) {
    let lists = [
        ("pending", &state.pending_tasks),
        ("current", &state.current_tasks),
        ("completed", &state.completed_tasks),
        ("failed", &state.failed_tasks),
    ];
    for (i, (left_name, left)) in lists.iter().enumerate() {
        for (right_name, right) in lists.iter().skip(i + 1) {
            for id in left.iter() {
                assert!(
                    !right.contains(id),
                    "task '{id}' is in both '{left_name}' and '{right_name}'"
                );
            }
        }
    }
}

/// Assert a task completed with the given output
pub fn assert_completed_with_output(state: &WorkflowState, task_id: &str, output: &str) {
    let result = state
        .task_results
        .get(task_id)
        .unwrap_or_else(|| panic!("no result recorded for task '{task_id}'"));
    assert_eq!(
        result.status,
        TaskStatus::Completed,
        "task '{task_id}' is {}, expected completed (error: {:?})",
        result.status,
        result.error
    );
    assert_eq!(
        result.output.as_deref(),
        Some(output),
        "task '{task_id}' produced unexpected output"
    );
}

/// Assert a task ended in the given terminal status
pub fn assert_task_status(state: &WorkflowState, task_id: &str, expected: TaskStatus) {
    let actual = state.task_status(task_id);
    assert_eq!(actual, expected, "task '{task_id}' is {actual}, expected {expected}");
}

/// Assert a task was skipped with a specific reason
pub fn assert_skipped_with_reason(state: &WorkflowState, task_id: &str, reason: &str) {
    let result = state
        .task_results
        .get(task_id)
        .unwrap_or_else(|| panic!("no result recorded for task '{task_id}'"));
    assert_eq!(result.status, TaskStatus::Skipped, "task '{task_id}' was not skipped");
    assert_eq!(
        result.error.as_deref(),
        Some(reason),
        "task '{task_id}' was skipped for a different reason"
    );
}

/// Assert every router load counter has returned to zero
pub fn assert_router_drained(router: &TaskRouter) {
    let summary = router.load_summary();
    for (agent_type, load) in summary {
        assert_eq!(load, 0, "executor '{agent_type}' still has load {load}");
    }
}
