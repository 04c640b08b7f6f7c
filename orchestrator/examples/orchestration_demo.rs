//! Walk-through of the orchestration core: strategy selection, DAG
//! execution with progress reporting, and a post-run metrics report.
//!
//! Run with `cargo run -p orchestrator --example orchestration_demo`.

use std::sync::Arc;

use mocks::StubAgent;
use orchestrator::{
    explain_strategy_choice, init_telemetry, LoggingConfig, ProgressCallback, WorkflowCoordinator,
};
use reporting::MetricsCollector;
use workflow_core::models::{AgentCapability, ExecutionStrategy, TaskDefinition, WorkflowDefinition};

fn content_pipeline() -> WorkflowDefinition {
    let mut research = TaskDefinition::new("research", "Research the topic and gather sources");
    research.required_capabilities = vec![AgentCapability::Research];

    let mut outline = TaskDefinition::new("outline", "Produce an outline from the research");
    outline.depends_on = vec!["research".to_string()];

    let mut draft = TaskDefinition::new("draft", "Write a full draft following the outline");
    draft.depends_on = vec!["outline".to_string()];
    draft.required_capabilities = vec![AgentCapability::Documentation];

    let mut review = TaskDefinition::new("review", "Review the draft for clarity and accuracy");
    review.depends_on = vec!["draft".to_string()];
    review.required_capabilities = vec![AgentCapability::CodeAnalysis];

    let mut workflow = WorkflowDefinition::new(
        "content-pipeline",
        "Content generation pipeline",
        vec![research, outline, draft, review],
    );
    workflow.execution_strategy = ExecutionStrategy::Dag;
    workflow.max_parallel_tasks = 2;
    workflow
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(&LoggingConfig::default())?;

    let workflow = content_pipeline();
    println!("{}\n", explain_strategy_choice(&workflow));

    let agent = Arc::new(StubAgent::ok_for_task());
    let coordinator = WorkflowCoordinator::new(agent);

    let progress: ProgressCallback = Arc::new(|state| {
        println!(
            "[progress] completed={} running={} pending={}",
            state.completed_tasks.len(),
            state.current_tasks.len(),
            state.pending_tasks.len()
        );
    });

    let name = workflow.name.clone();
    let state = coordinator
        .execute_workflow(workflow, Some(progress), false)
        .await?;

    println!("\nworkflow finished with status: {}", state.status);

    let mut collector = MetricsCollector::new();
    let metrics = collector.record_workflow(&state, &name);
    println!("\n{}", metrics.performance_report());

    Ok(())
}
