//! Demonstrates result caching across repeated runs and the workflow
//! visualizer.
//!
//! Run with `cargo run -p orchestrator --example caching_demo`.

use std::sync::Arc;

use mocks::StubAgent;
use orchestrator::{init_telemetry, LoggingConfig, WorkflowCoordinator};
use reporting::{visualize_workflow, VisualizationFormat};
use result_cache::{CacheConfig, CacheStrategy, ResultCache};
use workflow_core::models::{TaskDefinition, WorkflowDefinition};

fn etl_workflow() -> WorkflowDefinition {
    let extract = TaskDefinition::new("extract", "Extract records from the source system");
    let mut transform = TaskDefinition::new("transform", "Normalize and enrich the records");
    transform.depends_on = vec!["extract".to_string()];
    let mut load = TaskDefinition::new("load", "Load the records into the warehouse");
    load.depends_on = vec!["transform".to_string()];

    WorkflowDefinition::new("etl", "ETL pipeline", vec![extract, transform, load])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(&LoggingConfig::default())?;

    let agent = Arc::new(StubAgent::ok_for_task());
    let coordinator = WorkflowCoordinator::new(agent.clone()).with_cache(ResultCache::new(
        CacheConfig {
            strategy: CacheStrategy::Memory,
            ..CacheConfig::default()
        },
    ));

    let workflow = etl_workflow();

    println!("--- first run (cold cache) ---");
    coordinator
        .execute_workflow(workflow.clone(), None, false)
        .await?;
    println!(
        "agent calls: {}, cache: {:?}",
        agent.call_count(),
        coordinator.cache().stats()
    );

    println!("\n--- second run (warm cache) ---");
    let state = coordinator
        .execute_workflow(workflow.clone(), None, false)
        .await?;
    println!(
        "agent calls: {}, cache: {:?}",
        agent.call_count(),
        coordinator.cache().stats()
    );

    println!("\n--- invalidate 'extract' and rerun ---");
    let removed = coordinator.cache().invalidate("extract");
    println!("invalidated {removed} entries");
    coordinator
        .execute_workflow(workflow.clone(), None, false)
        .await?;
    println!(
        "agent calls: {}, cache: {:?}",
        agent.call_count(),
        coordinator.cache().stats()
    );

    println!("\n--- final state, ASCII view ---");
    println!(
        "{}",
        visualize_workflow(&workflow, Some(&state), VisualizationFormat::Ascii, true)
    );

    Ok(())
}
