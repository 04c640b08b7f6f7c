//! Mock implementations and test utilities for the workflow orchestration
//! system
//!
//! This crate provides testing infrastructure including:
//! - Stub agent substrates with call recording (echo, flaky, failing, slow)
//! - Fluent builders for task and workflow definitions
//! - Canonical workflow fixtures (chains, diamonds, cycles)
//! - Custom assertion helpers for state invariants

pub mod agents;
pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use agents::{AgentCall, EchoAgent, FailingAgent, FlakyAgent, SlowAgent, StubAgent};
pub use assertions::*;
pub use builders::{TaskBuilder, WorkflowBuilder};
pub use fixtures::*;
