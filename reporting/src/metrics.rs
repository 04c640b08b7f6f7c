use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workflow_core::models::{TaskStatus, WorkflowState, WorkflowStatus};

/// Timing and outcome of a single task execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskMetrics {
    pub task_id: String,
    pub status: TaskStatus,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub retry_count: u32,
    pub agent_used: Option<String>,
    pub error: Option<String>,
}

impl TaskMetrics {
    /// True when the task completed successfully
    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// True when the task ended in failure
    pub fn failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

/// Aggregated metrics for one workflow execution.
///
/// Derived from a terminal [`WorkflowState`]; only tasks that have both a
/// start and an end timestamp contribute to the per-task list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMetrics {
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: WorkflowStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
    pub total_retries: u32,

    /// Workflow wall-clock duration, `completed_at - started_at`
    pub total_duration_seconds: f64,
    pub task_metrics: Vec<TaskMetrics>,

    pub slowest_task: Option<TaskMetrics>,
    pub fastest_task: Option<TaskMetrics>,
    pub average_task_duration: f64,

    /// Completed tasks as a percentage of the total
    pub success_rate: f64,
    /// Total retries divided by total tasks
    pub retry_rate: f64,
}

impl WorkflowMetrics {
    /// Derive metrics from a terminal workflow state
    pub fn from_state(state: &WorkflowState, workflow_name: &str) -> Self {
        let mut task_metrics = Vec::new();
        for result in state.task_results.values() {
            if let (Some(started_at), Some(completed_at)) = (result.started_at, result.completed_at)
            {
                task_metrics.push(TaskMetrics {
                    task_id: result.task_id.clone(),
                    status: result.status,
                    duration_seconds: result.duration_seconds.unwrap_or(0.0),
                    started_at,
                    completed_at,
                    retry_count: result.retry_count,
                    agent_used: result.agent_used.clone(),
                    error: result.error.clone(),
                });
            }
        }
        task_metrics.sort_by(|a, b| a.task_id.cmp(&b.task_id));

        let total_tasks = task_metrics.len();
        let completed_tasks = task_metrics.iter().filter(|t| t.succeeded()).count();
        let failed_tasks = task_metrics.iter().filter(|t| t.failed()).count();
        let skipped_tasks = task_metrics
            .iter()
            .filter(|t| t.status == TaskStatus::Skipped)
            .count();
        let total_retries: u32 = task_metrics.iter().map(|t| t.retry_count).sum();

        let total_duration_seconds = match (state.started_at, state.completed_at) {
            (Some(start), Some(end)) => (end - start)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            _ => 0.0,
        };

        let completed: Vec<&TaskMetrics> =
            task_metrics.iter().filter(|t| t.succeeded()).collect();
        let slowest_task = completed
            .iter()
            .max_by(|a, b| a.duration_seconds.total_cmp(&b.duration_seconds))
            .map(|t| (*t).clone());
        let fastest_task = completed
            .iter()
            .min_by(|a, b| a.duration_seconds.total_cmp(&b.duration_seconds))
            .map(|t| (*t).clone());
        let average_task_duration = if completed.is_empty() {
            0.0
        } else {
            completed.iter().map(|t| t.duration_seconds).sum::<f64>() / completed.len() as f64
        };

        let (success_rate, retry_rate) = if total_tasks > 0 {
            (
                completed_tasks as f64 / total_tasks as f64 * 100.0,
                f64::from(total_retries) / total_tasks as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            workflow_id: state.workflow_id.clone(),
            workflow_name: workflow_name.to_string(),
            status: state.status,
            started_at: state.started_at,
            completed_at: state.completed_at,
            total_tasks,
            completed_tasks,
            failed_tasks,
            skipped_tasks,
            total_retries,
            total_duration_seconds,
            task_metrics,
            slowest_task,
            fastest_task,
            average_task_duration,
            success_rate,
            retry_rate,
        }
    }

    /// The slowest completed task, i.e. the biggest bottleneck
    pub fn bottleneck(&self) -> Option<&TaskMetrics> {
        self.slowest_task.as_ref()
    }

    /// Metrics for a specific task
    pub fn task(&self, task_id: &str) -> Option<&TaskMetrics> {
        self.task_metrics.iter().find(|t| t.task_id == task_id)
    }

    /// Metrics for every failed task
    pub fn failed(&self) -> Vec<&TaskMetrics> {
        self.task_metrics.iter().filter(|t| t.failed()).collect()
    }

    /// Human-readable performance report
    pub fn performance_report(&self) -> String {
        let mut lines = vec![
            format!(
                "Workflow Performance Report: {}",
                if self.workflow_name.is_empty() {
                    &self.workflow_id
                } else {
                    &self.workflow_name
                }
            ),
            "=".repeat(70),
            format!("Status: {}", self.status),
            format!("Total Duration: {:.2}s", self.total_duration_seconds),
            String::new(),
            "Task Summary:".to_string(),
            format!("  Total Tasks: {}", self.total_tasks),
            format!(
                "  Completed: {} ({:.1}%)",
                self.completed_tasks, self.success_rate
            ),
            format!("  Failed: {}", self.failed_tasks),
            format!("  Skipped: {}", self.skipped_tasks),
            format!(
                "  Total Retries: {} (avg {:.2} per task)",
                self.total_retries, self.retry_rate
            ),
            String::new(),
            "Performance:".to_string(),
            format!("  Average Task Duration: {:.2}s", self.average_task_duration),
        ];

        if let Some(slowest) = &self.slowest_task {
            lines.push(format!(
                "  Slowest Task: {} ({:.2}s)",
                slowest.task_id, slowest.duration_seconds
            ));
        }
        if let Some(fastest) = &self.fastest_task {
            lines.push(format!(
                "  Fastest Task: {} ({:.2}s)",
                fastest.task_id, fastest.duration_seconds
            ));
        }

        let failed = self.failed();
        if !failed.is_empty() {
            lines.push(String::new());
            lines.push("Failed Tasks:".to_string());
            for task in failed {
                lines.push(format!(
                    "  - {}: {}",
                    task.task_id,
                    task.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        lines.join("\n")
    }
}

/// Cross-workflow aggregates exposed by the collector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateStats {
    pub total_workflows: usize,
    pub total_tasks: usize,
    pub total_completed: usize,
    pub total_failed: usize,
    pub total_retries: u32,
    pub average_success_rate: f64,
    pub average_duration_seconds: f64,
}

/// Collects metrics for multiple workflow executions
#[derive(Debug, Default)]
pub struct MetricsCollector {
    workflows: HashMap<String, WorkflowMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record metrics for a finished workflow, replacing any earlier record
    /// for the same workflow id
    pub fn record_workflow(&mut self, state: &WorkflowState, workflow_name: &str) -> WorkflowMetrics {
        let metrics = WorkflowMetrics::from_state(state, workflow_name);
        self.workflows
            .insert(state.workflow_id.clone(), metrics.clone());
        metrics
    }

    /// Metrics for a specific workflow
    pub fn workflow_metrics(&self, workflow_id: &str) -> Option<&WorkflowMetrics> {
        self.workflows.get(workflow_id)
    }

    /// Metrics for all recorded workflows
    pub fn all_metrics(&self) -> Vec<&WorkflowMetrics> {
        self.workflows.values().collect()
    }

    /// Aggregate statistics across every recorded workflow
    pub fn aggregate_stats(&self) -> AggregateStats {
        let total_workflows = self.workflows.len();
        if total_workflows == 0 {
            return AggregateStats {
                total_workflows: 0,
                total_tasks: 0,
                total_completed: 0,
                total_failed: 0,
                total_retries: 0,
                average_success_rate: 0.0,
                average_duration_seconds: 0.0,
            };
        }

        let metrics = self.workflows.values();
        AggregateStats {
            total_workflows,
            total_tasks: metrics.clone().map(|m| m.total_tasks).sum(),
            total_completed: metrics.clone().map(|m| m.completed_tasks).sum(),
            total_failed: metrics.clone().map(|m| m.failed_tasks).sum(),
            total_retries: metrics.clone().map(|m| m.total_retries).sum(),
            average_success_rate: metrics.clone().map(|m| m.success_rate).sum::<f64>()
                / total_workflows as f64,
            average_duration_seconds: metrics
                .map(|m| m.total_duration_seconds)
                .sum::<f64>()
                / total_workflows as f64,
        }
    }

    /// Drop all recorded metrics
    pub fn clear(&mut self) {
        self.workflows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use workflow_core::models::{TaskDefinition, TaskResult, WorkflowDefinition};

    fn terminal_state() -> WorkflowState {
        let workflow = WorkflowDefinition::new(
            "wf",
            "pipeline",
            vec![
                TaskDefinition::new("fast", "quick work"),
                TaskDefinition::new("slow", "heavy work"),
                TaskDefinition::new("broken", "doomed work"),
            ],
        );
        let mut state = WorkflowState::new(&workflow);
        state.pending_tasks.clear();
        state.status = WorkflowStatus::Partial;

        let base = Utc::now();
        state.started_at = Some(base);
        state.completed_at = Some(base + Duration::seconds(10));

        let mut fast = TaskResult::running("fast", base);
        fast.status = TaskStatus::Completed;
        fast.output = Some("ok".to_string());
        fast.completed_at = Some(base + Duration::seconds(1));
        fast.duration_seconds = Some(1.0);
        fast.agent_used = Some("general-purpose".to_string());
        state.task_results.insert("fast".to_string(), fast);
        state.completed_tasks.push("fast".to_string());

        let mut slow = TaskResult::running("slow", base);
        slow.status = TaskStatus::Completed;
        slow.output = Some("ok".to_string());
        slow.completed_at = Some(base + Duration::seconds(5));
        slow.duration_seconds = Some(5.0);
        slow.retry_count = 2;
        state.task_results.insert("slow".to_string(), slow);
        state.completed_tasks.push("slow".to_string());

        let mut broken = TaskResult::running("broken", base);
        broken.status = TaskStatus::Failed;
        broken.error = Some("boom".to_string());
        broken.completed_at = Some(base + Duration::seconds(2));
        broken.duration_seconds = Some(2.0);
        state.task_results.insert("broken".to_string(), broken);
        state.failed_tasks.push("broken".to_string());

        state
    }

    #[test]
    fn test_metrics_from_state() {
        let metrics = WorkflowMetrics::from_state(&terminal_state(), "pipeline");

        assert_eq!(metrics.total_tasks, 3);
        assert_eq!(metrics.completed_tasks, 2);
        assert_eq!(metrics.failed_tasks, 1);
        assert_eq!(metrics.skipped_tasks, 0);
        assert_eq!(metrics.total_retries, 2);
        assert_eq!(metrics.total_duration_seconds, 10.0);
        assert_eq!(metrics.average_task_duration, 3.0);

        assert_eq!(metrics.slowest_task.as_ref().unwrap().task_id, "slow");
        assert_eq!(metrics.fastest_task.as_ref().unwrap().task_id, "fast");
        assert_eq!(metrics.bottleneck().unwrap().task_id, "slow");

        assert!((metrics.success_rate - 66.666).abs() < 0.1);
        assert!((metrics.retry_rate - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_failed_task_listing() {
        let metrics = WorkflowMetrics::from_state(&terminal_state(), "pipeline");
        let failed = metrics.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].task_id, "broken");
        assert_eq!(failed[0].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_performance_report_contents() {
        let metrics = WorkflowMetrics::from_state(&terminal_state(), "pipeline");
        let report = metrics.performance_report();
        assert!(report.contains("Workflow Performance Report: pipeline"));
        assert!(report.contains("Total Tasks: 3"));
        assert!(report.contains("Slowest Task: slow (5.00s)"));
        assert!(report.contains("- broken: boom"));
    }

    #[test]
    fn test_metrics_for_empty_state() {
        let workflow = WorkflowDefinition::new("wf", "empty", vec![]);
        let mut state = WorkflowState::new(&workflow);
        state.status = WorkflowStatus::Completed;
        let metrics = WorkflowMetrics::from_state(&state, "empty");
        assert_eq!(metrics.total_tasks, 0);
        assert_eq!(metrics.success_rate, 0.0);
        assert!(metrics.slowest_task.is_none());
    }

    #[test]
    fn test_collector_aggregates() {
        let mut collector = MetricsCollector::new();
        assert_eq!(collector.aggregate_stats().total_workflows, 0);

        collector.record_workflow(&terminal_state(), "pipeline");
        let stats = collector.aggregate_stats();
        assert_eq!(stats.total_workflows, 1);
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.total_completed, 2);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.total_retries, 2);

        assert!(collector.workflow_metrics("wf").is_some());
        assert_eq!(collector.all_metrics().len(), 1);

        collector.clear();
        assert!(collector.workflow_metrics("wf").is_none());
    }
}
