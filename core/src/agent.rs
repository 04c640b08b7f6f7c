use async_trait::async_trait;

use crate::error::Result;

/// Execution context handed to the agent substrate along with the prompt.
///
/// The core treats agents as opaque executors; this struct carries the
/// routing decision and the skill names to be resolved beyond the boundary.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// Id of the workflow the task belongs to
    pub workflow_id: String,
    /// Id of the task being executed
    pub task_id: String,
    /// Executor id chosen by the router
    pub agent_type: String,
    /// Skill names passed through from the task definition
    pub required_skills: Vec<String>,
}

/// Response returned by an agent substrate
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Opaque output text
    pub output: String,
    /// Executor id that actually handled the call, when it differs from the
    /// routed one
    pub agent_used: Option<String>,
}

impl AgentResponse {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            agent_used: None,
        }
    }
}

/// The agent execution substrate consumed by the orchestration core.
///
/// Implementations may be long-running and may fail; the driver wraps every
/// call with the task's timeout and retry policy. Implementations must be
/// safe to invoke concurrently.
#[async_trait]
pub trait AgentSubstrate: Send + Sync {
    /// Execute a prompt and return the opaque output text
    async fn run(&self, prompt: &str, context: &AgentContext) -> Result<AgentResponse>;
}
