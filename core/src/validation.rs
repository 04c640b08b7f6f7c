use std::collections::HashSet;

use crate::{
    error::{Result, WorkflowError},
    models::{RetryConfig, TaskDefinition, WorkflowDefinition},
};

/// Validation utilities for workflow and task definitions.
///
/// The coordinator validates every workflow before touching any state, so
/// executors and the state store can assume well-formed definitions: known
/// dependency ids, bounded priorities, and sane retry/timeout values.
pub struct WorkflowValidator;

impl WorkflowValidator {
    /// Validate a single task definition
    ///
    /// Rules:
    /// - `id` and `description` must be non-empty
    /// - `priority` must be in 1..=10
    /// - `timeout_seconds`, when set, must be >= 1
    /// - retry bounds: `initial_delay >= 0.1`, `backoff_multiplier >= 1.0`,
    ///   `max_delay >= 1.0`
    /// - a task must not depend on itself
    pub fn validate_task(task: &TaskDefinition) -> Result<()> {
        if task.id.is_empty() {
            return Err(WorkflowError::empty_field("id"));
        }
        if task.description.is_empty() {
            return Err(WorkflowError::empty_field("description"));
        }
        if !(1..=10).contains(&task.priority) {
            return Err(WorkflowError::validation(format!(
                "Task '{}' priority must be between 1 and 10, got {}",
                task.id, task.priority
            )));
        }
        if let Some(timeout) = task.timeout_seconds {
            if timeout < 1.0 {
                return Err(WorkflowError::validation(format!(
                    "Task '{}' timeout must be at least 1 second, got {timeout}",
                    task.id
                )));
            }
        }
        if task.depends_on.iter().any(|dep| dep == &task.id) {
            return Err(WorkflowError::validation(format!(
                "Task '{}' cannot depend on itself",
                task.id
            )));
        }
        Self::validate_retry_config(&task.id, &task.retry_config)
    }

    fn validate_retry_config(task_id: &str, config: &RetryConfig) -> Result<()> {
        if config.initial_delay < 0.1 {
            return Err(WorkflowError::validation(format!(
                "Task '{task_id}' retry initial_delay must be at least 0.1, got {}",
                config.initial_delay
            )));
        }
        if config.backoff_multiplier < 1.0 {
            return Err(WorkflowError::validation(format!(
                "Task '{task_id}' retry backoff_multiplier must be at least 1.0, got {}",
                config.backoff_multiplier
            )));
        }
        if config.max_delay < 1.0 {
            return Err(WorkflowError::validation(format!(
                "Task '{task_id}' retry max_delay must be at least 1.0, got {}",
                config.max_delay
            )));
        }
        Ok(())
    }

    /// Validate a complete workflow definition
    ///
    /// Rules, on top of per-task validation:
    /// - workflow `id` must be non-empty
    /// - task ids must be unique
    /// - every dependency must reference a task defined in the workflow
    /// - `max_parallel_tasks` must be >= 1
    /// - `default_timeout_seconds`, when set, must be >= 1
    pub fn validate_workflow(workflow: &WorkflowDefinition) -> Result<()> {
        if workflow.id.is_empty() {
            return Err(WorkflowError::empty_field("id"));
        }
        if workflow.max_parallel_tasks < 1 {
            return Err(WorkflowError::validation(
                "max_parallel_tasks must be at least 1".to_string(),
            ));
        }
        if let Some(timeout) = workflow.default_timeout_seconds {
            if timeout < 1.0 {
                return Err(WorkflowError::validation(format!(
                    "default_timeout_seconds must be at least 1, got {timeout}"
                )));
            }
        }

        let mut seen = HashSet::new();
        for task in &workflow.tasks {
            Self::validate_task(task)?;
            if !seen.insert(task.id.as_str()) {
                return Err(WorkflowError::validation(format!(
                    "Duplicate task id '{}'",
                    task.id
                )));
            }
        }

        let known: HashSet<&str> = workflow.tasks.iter().map(|t| t.id.as_str()).collect();
        for task in &workflow.tasks {
            for dep in task.dependencies() {
                if !known.contains(dep) {
                    return Err(WorkflowError::validation(format!(
                        "Task '{}' depends on unknown task '{dep}'",
                        task.id
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_workflow_passes() {
        let a = TaskDefinition::new("a", "first");
        let mut b = TaskDefinition::new("b", "second");
        b.depends_on = vec!["a".to_string()];
        let workflow = WorkflowDefinition::new("wf", "test", vec![a, b]);
        assert!(WorkflowValidator::validate_workflow(&workflow).is_ok());
    }

    #[test]
    fn test_empty_workflow_is_valid() {
        let workflow = WorkflowDefinition::new("wf", "empty", vec![]);
        assert!(WorkflowValidator::validate_workflow(&workflow).is_ok());
    }

    #[test]
    fn test_empty_task_id_rejected() {
        let task = TaskDefinition::new("", "task");
        let err = WorkflowValidator::validate_task(&task).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_priority_bounds() {
        let mut task = TaskDefinition::new("t", "task");
        task.priority = 0;
        assert!(WorkflowValidator::validate_task(&task).is_err());
        task.priority = 11;
        assert!(WorkflowValidator::validate_task(&task).is_err());
        task.priority = 10;
        assert!(WorkflowValidator::validate_task(&task).is_ok());
    }

    #[test]
    fn test_timeout_minimum() {
        let mut task = TaskDefinition::new("t", "task");
        task.timeout_seconds = Some(0.5);
        assert!(WorkflowValidator::validate_task(&task).is_err());
        task.timeout_seconds = Some(1.0);
        assert!(WorkflowValidator::validate_task(&task).is_ok());
    }

    #[test]
    fn test_retry_config_bounds() {
        let mut task = TaskDefinition::new("t", "task");
        task.retry_config.initial_delay = 0.05;
        assert!(WorkflowValidator::validate_task(&task).is_err());

        task.retry_config = RetryConfig::default();
        task.retry_config.backoff_multiplier = 0.5;
        assert!(WorkflowValidator::validate_task(&task).is_err());

        task.retry_config = RetryConfig::default();
        task.retry_config.max_delay = 0.5;
        assert!(WorkflowValidator::validate_task(&task).is_err());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut task = TaskDefinition::new("t", "task");
        task.depends_on = vec!["t".to_string()];
        let err = WorkflowValidator::validate_task(&task).unwrap_err();
        assert!(err.to_string().contains("cannot depend on itself"));
    }

    #[test]
    fn test_duplicate_task_ids_rejected() {
        let workflow = WorkflowDefinition::new(
            "wf",
            "test",
            vec![
                TaskDefinition::new("a", "first"),
                TaskDefinition::new("a", "again"),
            ],
        );
        let err = WorkflowValidator::validate_workflow(&workflow).unwrap_err();
        assert!(err.to_string().contains("Duplicate task id"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut task = TaskDefinition::new("a", "first");
        task.depends_on = vec!["ghost".to_string()];
        let workflow = WorkflowDefinition::new("wf", "test", vec![task]);
        let err = WorkflowValidator::validate_workflow(&workflow).unwrap_err();
        assert!(err.to_string().contains("unknown task 'ghost'"));
    }

    #[test]
    fn test_max_parallel_tasks_minimum() {
        let mut workflow = WorkflowDefinition::new("wf", "test", vec![]);
        workflow.max_parallel_tasks = 0;
        assert!(WorkflowValidator::validate_workflow(&workflow).is_err());
    }
}
