use workflow_core::models::{ExecutionStrategy, WorkflowDefinition};

/// Structural characteristics of a workflow, feeding strategy selection
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowAnalysis {
    pub task_count: usize,
    pub independent_tasks: usize,
    pub total_dependencies: usize,
    pub has_dependencies: bool,
    pub has_conditions: bool,
    pub can_parallelize: bool,
}

/// Inspect a workflow's shape
pub fn analyze_workflow(workflow: &WorkflowDefinition) -> WorkflowAnalysis {
    let task_count = workflow.tasks.len();
    let total_dependencies: usize = workflow
        .tasks
        .iter()
        .map(|task| task.dependencies().count())
        .sum();
    let independent_tasks = workflow
        .tasks
        .iter()
        .filter(|task| task.depends_on.is_empty())
        .count();
    let has_dependencies = total_dependencies > 0;
    let has_conditions = workflow.tasks.iter().any(|task| task.condition.is_some());

    WorkflowAnalysis {
        task_count,
        independent_tasks,
        total_dependencies,
        has_dependencies,
        has_conditions,
        can_parallelize: independent_tasks > 1 || (has_dependencies && independent_tasks > 0),
    }
}

/// Recommend a scheduling strategy for a workflow.
///
/// Decision table, applied in order:
/// 1. Any task has a condition → conditional
/// 2. No dependencies and more than one task → parallel
/// 3. Any dependencies → dag
/// 4. Otherwise → sequential
pub fn recommend_strategy(workflow: &WorkflowDefinition) -> ExecutionStrategy {
    if workflow.tasks.is_empty() {
        return ExecutionStrategy::Sequential;
    }
    let analysis = analyze_workflow(workflow);

    if analysis.has_conditions {
        ExecutionStrategy::Conditional
    } else if !analysis.has_dependencies {
        if analysis.task_count > 1 {
            ExecutionStrategy::Parallel
        } else {
            ExecutionStrategy::Sequential
        }
    } else {
        ExecutionStrategy::Dag
    }
}

/// Human-readable explanation of the strategy recommendation
pub fn explain_strategy_choice(workflow: &WorkflowDefinition) -> String {
    let analysis = analyze_workflow(workflow);
    let recommended = recommend_strategy(workflow);

    let mut lines = vec![
        format!("Workflow '{}' analysis:", workflow.name),
        format!("  - Tasks: {}", analysis.task_count),
        format!("  - Independent tasks: {}", analysis.independent_tasks),
        format!("  - Has dependencies: {}", analysis.has_dependencies),
        format!("  - Has conditions: {}", analysis.has_conditions),
        format!("\nRecommended strategy: {recommended}"),
    ];

    lines.push(match recommended {
        ExecutionStrategy::Conditional => {
            "  Reason: Workflow contains conditional tasks that require runtime evaluation"
                .to_string()
        }
        ExecutionStrategy::Parallel => {
            "  Reason: All tasks are independent and can run concurrently".to_string()
        }
        ExecutionStrategy::Dag => {
            "  Reason: Workflow has dependencies - DAG enables optimal parallel execution"
                .to_string()
        }
        ExecutionStrategy::Sequential => {
            "  Reason: Simple workflow best suited for sequential execution".to_string()
        }
    });

    lines.join("\n")
}
