use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Error types for the workflow orchestration core.
///
/// Task-level errors (`TaskExecution`, `TaskTimeout`) are recovered locally by
/// the driver's retry loop until `max_retries` is exceeded. Workflow-level
/// errors (`Cycle`, `WorkflowTimeout`, `Cancelled`) short-circuit the whole
/// run. `CacheIo` is internal to the cache and is never surfaced to callers.
///
/// # Examples
///
/// ```rust
/// use workflow_core::error::WorkflowError;
///
/// let err = WorkflowError::task_timeout("fetch", 30.0);
/// assert!(err.is_retryable());
///
/// let err = WorkflowError::cycle("wf-1");
/// assert!(!err.is_retryable());
/// assert!(err.to_string().contains("Circular dependency"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// The agent substrate raised or returned an error
    #[error("Task execution failed: {0}")]
    TaskExecution(String),

    /// The per-task deadline expired during an agent invocation
    #[error("Task '{task_id}' timed out after {timeout_seconds}s")]
    TaskTimeout { task_id: String, timeout_seconds: f64 },

    /// The dependency graph contains a cycle; fatal to the workflow
    #[error("Circular dependency detected in workflow '{0}'")]
    Cycle(String),

    /// The workflow or a task was cancelled
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The workflow-level deadline expired
    #[error("Workflow execution timed out after {0}s")]
    WorkflowTimeout(f64),

    /// Cache tier failure; counted as a miss, never propagated
    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    /// A definition failed validation before execution
    #[error("Validation error: {0}")]
    Validation(String),

    /// A task id was referenced that the workflow does not define
    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

impl WorkflowError {
    /// Create a task execution error from an agent failure message
    pub fn task_execution(message: impl Into<String>) -> Self {
        Self::TaskExecution(message.into())
    }

    /// Create a per-task timeout error
    pub fn task_timeout(task_id: impl Into<String>, timeout_seconds: f64) -> Self {
        Self::TaskTimeout {
            task_id: task_id.into(),
            timeout_seconds,
        }
    }

    /// Create a cycle error for a workflow
    pub fn cycle(workflow_id: impl Into<String>) -> Self {
        Self::Cycle(workflow_id.into())
    }

    /// Create a cancellation error
    pub fn cancelled(what: impl Into<String>) -> Self {
        Self::Cancelled(what.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a validation error for an empty field
    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("Field '{field}' cannot be empty"))
    }

    /// Whether the driver may retry the task after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::TaskExecution(_) | WorkflowError::TaskTimeout { .. }
        )
    }

    /// Whether this error aborts the whole workflow
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkflowError::Cycle(_) | WorkflowError::WorkflowTimeout(_) | WorkflowError::Cancelled(_)
        )
    }

    /// Check if this error indicates a validation problem
    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkflowError::task_execution("boom");
        assert_eq!(err.to_string(), "Task execution failed: boom");

        let err = WorkflowError::task_timeout("fetch", 5.0);
        assert_eq!(err.to_string(), "Task 'fetch' timed out after 5s");

        let err = WorkflowError::cycle("wf-1");
        assert_eq!(
            err.to_string(),
            "Circular dependency detected in workflow 'wf-1'"
        );

        let err = WorkflowError::WorkflowTimeout(30.0);
        assert_eq!(err.to_string(), "Workflow execution timed out after 30s");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(WorkflowError::task_execution("x").is_retryable());
        assert!(WorkflowError::task_timeout("t", 1.0).is_retryable());
        assert!(!WorkflowError::cancelled("workflow wf-1").is_retryable());
        assert!(!WorkflowError::cycle("wf").is_retryable());
        assert!(!WorkflowError::validation("bad").is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(WorkflowError::cycle("wf").is_fatal());
        assert!(WorkflowError::WorkflowTimeout(1.0).is_fatal());
        assert!(WorkflowError::cancelled("wf").is_fatal());
        assert!(!WorkflowError::task_execution("x").is_fatal());
    }

    #[test]
    fn test_validation_helpers() {
        let err = WorkflowError::empty_field("id");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Validation error: Field 'id' cannot be empty");
    }
}
