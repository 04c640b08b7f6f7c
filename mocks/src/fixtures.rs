//! Canonical workflow shapes used across the test suites.

use workflow_core::models::{ExecutionStrategy, WorkflowDefinition};

use crate::builders::{TaskBuilder, WorkflowBuilder};

/// `a -> b -> c`, DAG strategy
pub fn linear_chain() -> WorkflowDefinition {
    WorkflowBuilder::new("linear-chain")
        .with_task(TaskBuilder::new("a").build())
        .with_task(TaskBuilder::new("b").with_depends_on(&["a"]).build())
        .with_task(TaskBuilder::new("c").with_depends_on(&["b"]).build())
        .with_strategy(ExecutionStrategy::Dag)
        .build()
}

/// `a -> (b, c) -> d`, DAG strategy with room to run b and c concurrently
pub fn diamond() -> WorkflowDefinition {
    WorkflowBuilder::new("diamond")
        .with_task(TaskBuilder::new("a").build())
        .with_task(TaskBuilder::new("b").with_depends_on(&["a"]).build())
        .with_task(TaskBuilder::new("c").with_depends_on(&["a"]).build())
        .with_task(TaskBuilder::new("d").with_depends_on(&["b", "c"]).build())
        .with_strategy(ExecutionStrategy::Dag)
        .with_max_parallel(4)
        .build()
}

/// `count` tasks with no dependencies, parallel strategy
pub fn independent_tasks(count: usize) -> WorkflowDefinition {
    let mut builder = WorkflowBuilder::new("independent").with_strategy(ExecutionStrategy::Parallel);
    for index in 0..count {
        builder = builder.with_task(TaskBuilder::new(format!("task-{index}")).build());
    }
    builder.build()
}

/// Two tasks depending on each other; every executor must reject this
pub fn cyclic_workflow() -> WorkflowDefinition {
    WorkflowBuilder::new("cyclic")
        .with_task(TaskBuilder::new("a").with_depends_on(&["b"]).build())
        .with_task(TaskBuilder::new("b").with_depends_on(&["a"]).build())
        .with_strategy(ExecutionStrategy::Dag)
        .build()
}

/// A cascade with a conditional step gated on the first task's completion
pub fn conditional_cascade() -> WorkflowDefinition {
    WorkflowBuilder::new("conditional")
        .with_task(TaskBuilder::new("probe").build())
        .with_task(
            TaskBuilder::new("expand")
                .with_depends_on(&["probe"])
                .with_condition("probe == 'completed'")
                .build(),
        )
        .with_task(
            TaskBuilder::new("cleanup")
                .with_depends_on(&["probe"])
                .with_condition("never-referenced")
                .build(),
        )
        .with_strategy(ExecutionStrategy::Conditional)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_core::WorkflowValidator;

    #[test]
    fn test_fixtures_are_valid() {
        WorkflowValidator::validate_workflow(&linear_chain()).unwrap();
        WorkflowValidator::validate_workflow(&diamond()).unwrap();
        WorkflowValidator::validate_workflow(&independent_tasks(3)).unwrap();
        WorkflowValidator::validate_workflow(&conditional_cascade()).unwrap();
        // the cycle passes static validation; executors detect it at runtime
        WorkflowValidator::validate_workflow(&cyclic_workflow()).unwrap();
    }
}
