//! Builder pattern implementations for easy test data construction
//!
//! Provides fluent builders for:
//! - Task construction with sensible defaults
//! - Workflow construction with strategy and policy knobs

use workflow_core::models::{
    AgentCapability, ExecutionStrategy, RetryConfig, TaskDefinition, WorkflowDefinition,
};

/// Builder for constructing TaskDefinition instances in tests
pub struct TaskBuilder {
    task: TaskDefinition,
}

impl TaskBuilder {
    /// Create a builder for a task with the given id
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let description = format!("test task {id}");
        Self {
            task: TaskDefinition::new(id, description),
        }
    }

    /// Set the task description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.task.description = description.into();
        self
    }

    /// Set the dependency list
    pub fn with_depends_on(mut self, deps: &[&str]) -> Self {
        self.task.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Set the required capabilities
    pub fn with_capabilities(mut self, capabilities: Vec<AgentCapability>) -> Self {
        self.task.required_capabilities = capabilities;
        self
    }

    /// Set the required skills
    pub fn with_skills(mut self, skills: &[&str]) -> Self {
        self.task.required_skills = skills.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the routing priority
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.task.priority = priority;
        self
    }

    /// Set the per-task timeout
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.task.timeout_seconds = Some(seconds);
        self
    }

    /// Set the retry configuration
    pub fn with_retry(mut self, retry_config: RetryConfig) -> Self {
        self.task.retry_config = retry_config;
        self
    }

    /// Disable retries
    pub fn without_retries(mut self) -> Self {
        self.task.retry_config = RetryConfig::none();
        self
    }

    /// Add a parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.task.parameters.insert(key.into(), value);
        self
    }

    /// Pin the task to a specific executor id
    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.task.agent_type = Some(agent_type.into());
        self
    }

    /// Set a condition expression
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.task.condition = Some(condition.into());
        self
    }

    /// Set the expected output type
    pub fn with_expected_output(mut self, output_type: impl Into<String>) -> Self {
        self.task.expected_output_type = Some(output_type.into());
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.task
    }
}

/// Builder for constructing WorkflowDefinition instances in tests
pub struct WorkflowBuilder {
    workflow: WorkflowDefinition,
}

impl WorkflowBuilder {
    /// Create a builder for a workflow with the given id
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let name = format!("test workflow {id}");
        Self {
            workflow: WorkflowDefinition::new(id, name, vec![]),
        }
    }

    /// Set the workflow name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.workflow.name = name.into();
        self
    }

    /// Append a task
    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.workflow.tasks.push(task);
        self
    }

    /// Append several tasks
    pub fn with_tasks(mut self, tasks: Vec<TaskDefinition>) -> Self {
        self.workflow.tasks.extend(tasks);
        self
    }

    /// Set the execution strategy
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.workflow.execution_strategy = strategy;
        self
    }

    /// Set the concurrency bound
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.workflow.max_parallel_tasks = max_parallel;
        self
    }

    /// Set the workflow-level deadline
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.workflow.default_timeout_seconds = Some(seconds);
        self
    }

    /// Keep executing after failures
    pub fn continue_on_failure(mut self) -> Self {
        self.workflow.continue_on_failure = true;
        self
    }

    pub fn build(self) -> WorkflowDefinition {
        self.workflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = TaskBuilder::new("analyze")
            .with_description("analyze the data")
            .with_depends_on(&["fetch"])
            .with_capabilities(vec![AgentCapability::DataProcessing])
            .with_priority(8)
            .with_timeout(30.0)
            .without_retries()
            .with_parameter("depth", serde_json::json!(3))
            .build();

        assert_eq!(task.id, "analyze");
        assert_eq!(task.depends_on, vec!["fetch"]);
        assert_eq!(task.priority, 8);
        assert_eq!(task.timeout_seconds, Some(30.0));
        assert_eq!(task.retry_config.max_retries, 0);
        assert_eq!(task.parameters["depth"], serde_json::json!(3));
    }

    #[test]
    fn test_workflow_builder() {
        let workflow = WorkflowBuilder::new("wf")
            .with_name("pipeline")
            .with_task(TaskBuilder::new("a").build())
            .with_task(TaskBuilder::new("b").with_depends_on(&["a"]).build())
            .with_strategy(ExecutionStrategy::Sequential)
            .with_max_parallel(2)
            .continue_on_failure()
            .build();

        assert_eq!(workflow.tasks.len(), 2);
        assert_eq!(workflow.execution_strategy, ExecutionStrategy::Sequential);
        assert_eq!(workflow.max_parallel_tasks, 2);
        assert!(workflow.continue_on_failure);
    }
}
