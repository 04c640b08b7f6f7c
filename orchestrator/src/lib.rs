//! Orchestrator Library
//!
//! Drives workflows from the `workflow-core` data model to completion:
//!
//! - [`executor`] - The four scheduling strategies (sequential, parallel,
//!   DAG, conditional) over a shared per-task driver
//! - [`coordinator`] - The workflow coordinator and the driver itself:
//!   routing, caching, retry with exponential backoff, timeouts, progress
//!   callbacks
//! - [`strategy`] - Automatic strategy selection from workflow shape
//! - [`telemetry`] - Tracing subscriber setup for embedding binaries
//!
//! The agent substrate is consumed through the
//! [`workflow_core::AgentSubstrate`] trait; the core never talks to a model
//! directly.

pub mod coordinator;
pub mod executor;
pub mod strategy;
pub mod telemetry;

pub use coordinator::{ProgressCallback, WorkflowCoordinator};
pub use executor::{
    Executor, TaskDriver, SKIP_PREVIOUS_FAILURE, SKIP_UNSATISFIED_DEPENDENCIES,
};
pub use strategy::{analyze_workflow, explain_strategy_choice, recommend_strategy, WorkflowAnalysis};
pub use telemetry::{init_telemetry, LogFormat, LoggingConfig};
