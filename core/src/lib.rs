//! Workflow Core Library
//!
//! This crate provides the foundational domain models, per-workflow state
//! tracking, and trait interfaces for the workflow orchestration system. The
//! executor and coordinator crates build on the types and interfaces defined
//! here.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`models`] - Core domain models (TaskDefinition, WorkflowState, etc.)
//! - [`error`] - Error types and result handling
//! - [`state`] - Per-workflow state store with serialized transitions
//! - [`routing`] - Capability-based task routing with load accounting
//! - [`condition`] - Pluggable condition predicates for conditional tasks
//! - [`agent`] - The agent-substrate boundary trait
//! - [`validation`] - Definition validation utilities
//!
//! # Example
//!
//! ```rust
//! use workflow_core::{
//!     models::{TaskDefinition, WorkflowDefinition},
//!     validation::WorkflowValidator,
//! };
//!
//! let mut review = TaskDefinition::new("review", "Review the draft");
//! review.depends_on = vec!["draft".to_string()];
//! let workflow = WorkflowDefinition::new(
//!     "wf-1",
//!     "Writing pipeline",
//!     vec![TaskDefinition::new("draft", "Write the draft"), review],
//! );
//!
//! // Validate the workflow before submission
//! WorkflowValidator::validate_workflow(&workflow).unwrap();
//! ```

pub mod agent;
pub mod condition;
pub mod error;
pub mod models;
pub mod routing;
pub mod state;
pub mod validation;

// Re-export commonly used types at the crate root for convenience
pub use agent::{AgentContext, AgentResponse, AgentSubstrate};
pub use condition::{CompletedReference, ConditionEvaluator};
pub use error::{Result, WorkflowError};
pub use models::{
    AgentCapability, AgentRouting, ExecutionStrategy, OrchestrationConfig, RetryConfig,
    TaskDefinition, TaskResult, TaskStatus, WorkflowDefinition, WorkflowProgress, WorkflowState,
    WorkflowStatus,
};
pub use routing::{default_routing, TaskRouter, FALLBACK_AGENT_TYPE};
pub use state::{StateStore, SKIP_CONDITION_NOT_MET};
pub use validation::WorkflowValidator;

/// Current version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
