use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Definition of a single unit of work inside a workflow.
///
/// A task carries an opaque prompt (`description`) for the agent substrate,
/// the ids of the tasks whose outputs it consumes, and everything the
/// orchestrator needs to route, retry, and cache it. Definitions are immutable
/// once a workflow is submitted; all execution state lives in
/// [`WorkflowState`].
///
/// # Examples
///
/// ```rust
/// use workflow_core::models::{AgentCapability, TaskDefinition};
///
/// let mut task = TaskDefinition::new("review", "Review the generated module");
/// task.depends_on = vec!["generate".to_string()];
/// task.required_capabilities = vec![AgentCapability::CodeAnalysis];
/// task.priority = 7;
///
/// assert_eq!(task.dependencies().collect::<Vec<_>>(), vec!["generate"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDefinition {
    /// Unique identifier within the workflow
    pub id: String,
    /// Prompt text describing what the task should do
    pub description: String,
    /// Ids of tasks that must complete before this one may start
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Capabilities an executor must provide to receive this task
    #[serde(default = "default_capabilities")]
    pub required_capabilities: Vec<AgentCapability>,
    /// Skill names passed through to the agent substrate
    #[serde(default)]
    pub required_skills: Vec<String>,
    /// Routing priority, 1-10 (higher is preferred earlier)
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Per-task deadline for a single agent invocation, in seconds
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    /// Retry behavior when the agent invocation fails
    #[serde(default)]
    pub retry_config: RetryConfig,
    /// Free-form parameters; participate in the cache key (key-sorted)
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Explicit executor id, overriding capability-based routing
    #[serde(default)]
    pub agent_type: Option<String>,
    /// Opaque condition expression, evaluated only by condition-aware paths
    #[serde(default)]
    pub condition: Option<String>,
    /// Expected output type/format, appended to the prompt when set
    #[serde(default)]
    pub expected_output_type: Option<String>,
}

fn default_capabilities() -> Vec<AgentCapability> {
    vec![AgentCapability::General]
}

fn default_priority() -> u8 {
    5
}

impl TaskDefinition {
    /// Create a task with default routing, retry, and cache settings
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            depends_on: Vec::new(),
            required_capabilities: default_capabilities(),
            required_skills: Vec::new(),
            priority: default_priority(),
            timeout_seconds: None,
            retry_config: RetryConfig::default(),
            parameters: BTreeMap::new(),
            agent_type: None,
            condition: None,
            expected_output_type: None,
        }
    }

    /// Iterate the declared dependencies with duplicates collapsed,
    /// preserving declaration order
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        let mut seen = std::collections::HashSet::new();
        self.depends_on
            .iter()
            .map(String::as_str)
            .filter(move |id| seen.insert(*id))
    }
}

/// Retry configuration for a single task.
///
/// The driver sleeps `initial_delay` seconds after the first failure and
/// multiplies the delay by `backoff_multiplier` after each subsequent one,
/// never exceeding `max_delay`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Exponential backoff multiplier (>= 1.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Initial delay in seconds (>= 0.1)
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,
    /// Maximum delay in seconds (>= 1.0)
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    60.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Lifecycle states of a task inside a running workflow.
///
/// Observable transitions are `pending → running → (completed | failed)`,
/// `running → retrying → pending` for failed attempts with retries left, and
/// `pending → skipped` for tasks that never run.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for dependencies or a free executor slot
    Pending,
    /// Dependencies satisfied, eligible for launch
    Ready,
    /// A driver is executing the task
    Running,
    /// Terminal: the agent produced an output
    Completed,
    /// Terminal: retries exhausted or a fatal error occurred
    Failed,
    /// Terminal: never executed (fail-fast, condition, or dependencies)
    Skipped,
    /// A failed attempt is waiting out its backoff delay
    Retrying,
}

impl TaskStatus {
    /// True for `Completed`, `Failed`, and `Skipped`
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Retrying => "retrying",
        };
        write!(f, "{s}")
    }
}

/// Scheduling discipline applied to a workflow's tasks
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// One task at a time, in declaration order
    Sequential,
    /// All tasks concurrently, bounded by `max_parallel_tasks`; dependencies
    /// are not consulted
    Parallel,
    /// Dependency-ordered execution with bounded concurrency
    Dag,
    /// Declaration order with skip points for unmet dependencies/conditions
    Conditional,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStrategy::Sequential => "sequential",
            ExecutionStrategy::Parallel => "parallel",
            ExecutionStrategy::Dag => "dag",
            ExecutionStrategy::Conditional => "conditional",
        };
        write!(f, "{s}")
    }
}

/// Capability categories used to match tasks to executors
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentCapability {
    General,
    CodeAnalysis,
    CodeGeneration,
    Testing,
    Debugging,
    Documentation,
    DataProcessing,
    FileOperations,
    ApiIntegration,
    Research,
}

impl AgentCapability {
    /// Stable string form, used in cache keys and visualizations
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentCapability::General => "general",
            AgentCapability::CodeAnalysis => "code_analysis",
            AgentCapability::CodeGeneration => "code_generation",
            AgentCapability::Testing => "testing",
            AgentCapability::Debugging => "debugging",
            AgentCapability::Documentation => "documentation",
            AgentCapability::DataProcessing => "data_processing",
            AgentCapability::FileOperations => "file_operations",
            AgentCapability::ApiIntegration => "api_integration",
            AgentCapability::Research => "research",
        }
    }
}

impl std::fmt::Display for AgentCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A complete workflow: an ordered collection of tasks plus execution policy.
///
/// # Examples
///
/// ```rust
/// use workflow_core::models::{ExecutionStrategy, TaskDefinition, WorkflowDefinition};
///
/// let analyze = TaskDefinition::new("analyze", "Analyze the input");
/// let mut summarize = TaskDefinition::new("summarize", "Summarize the analysis");
/// summarize.depends_on = vec!["analyze".to_string()];
///
/// let workflow = WorkflowDefinition::new("wf-1", "Analysis", vec![analyze, summarize]);
/// assert_eq!(workflow.execution_strategy, ExecutionStrategy::Dag);
/// assert!(workflow.task("analyze").is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    /// Unique workflow identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Workflow description
    #[serde(default)]
    pub description: String,
    /// Tasks in declaration order
    pub tasks: Vec<TaskDefinition>,
    /// Scheduling discipline
    #[serde(default = "default_strategy")]
    pub execution_strategy: ExecutionStrategy,
    /// Deadline for the whole run, in seconds
    #[serde(default)]
    pub default_timeout_seconds: Option<f64>,
    /// Maximum number of concurrently running drivers (>= 1)
    #[serde(default = "default_max_parallel")]
    pub max_parallel_tasks: usize,
    /// Keep executing after a task fails instead of skipping the remainder
    #[serde(default)]
    pub continue_on_failure: bool,
}

fn default_strategy() -> ExecutionStrategy {
    ExecutionStrategy::Dag
}

fn default_max_parallel() -> usize {
    5
}

impl WorkflowDefinition {
    /// Create a workflow with the default strategy and limits
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        tasks: Vec<TaskDefinition>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tasks,
            execution_strategy: default_strategy(),
            default_timeout_seconds: None,
            max_parallel_tasks: default_max_parallel(),
            continue_on_failure: false,
        }
    }

    /// Look up a task definition by id
    pub fn task(&self, task_id: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// Result of a single task execution.
///
/// Created when the task first transitions to `running`, mutated only by the
/// task's own driver, and frozen once the status is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    /// Id of the executed task
    pub task_id: String,
    /// Final (or current) status
    pub status: TaskStatus,
    /// Agent output text, present on completion
    #[serde(default)]
    pub output: Option<String>,
    /// Error message, present on failure or skip
    #[serde(default)]
    pub error: Option<String>,
    /// When the task transitioned to `running` (or was skipped)
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// `completed_at - started_at`, in seconds
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Number of retries attempted
    #[serde(default)]
    pub retry_count: u32,
    /// Executor id that produced the output
    #[serde(default)]
    pub agent_used: Option<String>,
}

impl TaskResult {
    /// A fresh result for a task that just started running
    pub fn running(task_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Running,
            output: None,
            error: None,
            started_at: Some(started_at),
            completed_at: None,
            duration_seconds: None,
            retry_count: 0,
            agent_used: None,
        }
    }
}

/// Overall status of a workflow execution
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// `continue_on_failure` runs where some tasks completed and some failed
    Partial,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Partial => "partial",
        };
        write!(f, "{s}")
    }
}

/// Mutable execution state of a workflow.
///
/// Owned by the state store; everything outside the store sees value
/// snapshots. The four membership lists are pairwise disjoint at every
/// observation point; a skipped task appears in `task_results` but in none of
/// them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    /// Id of the workflow being executed
    pub workflow_id: String,
    /// Overall status
    pub status: WorkflowStatus,
    /// Results of tasks that have started, keyed by task id
    #[serde(default)]
    pub task_results: std::collections::HashMap<String, TaskResult>,
    /// Ids of currently executing tasks
    #[serde(default)]
    pub current_tasks: Vec<String>,
    /// Ids of tasks not yet started
    #[serde(default)]
    pub pending_tasks: Vec<String>,
    /// Ids of completed tasks
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    /// Ids of failed tasks
    #[serde(default)]
    pub failed_tasks: Vec<String>,
    /// Workflow start timestamp
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Workflow completion timestamp
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Overall workflow error, if failed
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkflowState {
    /// Initial state for a workflow: every task pending
    pub fn new(workflow: &WorkflowDefinition) -> Self {
        Self {
            workflow_id: workflow.id.clone(),
            status: WorkflowStatus::Pending,
            task_results: std::collections::HashMap::new(),
            current_tasks: Vec::new(),
            pending_tasks: workflow.tasks.iter().map(|t| t.id.clone()).collect(),
            completed_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Current status of a task, derived from results and membership lists
    pub fn task_status(&self, task_id: &str) -> TaskStatus {
        if let Some(result) = self.task_results.get(task_id) {
            return result.status;
        }
        if self.current_tasks.iter().any(|id| id == task_id) {
            TaskStatus::Running
        } else if self.completed_tasks.iter().any(|id| id == task_id) {
            TaskStatus::Completed
        } else if self.failed_tasks.iter().any(|id| id == task_id) {
            TaskStatus::Failed
        } else {
            TaskStatus::Pending
        }
    }

    /// Output of a completed task, if any
    pub fn task_output(&self, task_id: &str) -> Option<&str> {
        self.task_results
            .get(task_id)
            .and_then(|r| r.output.as_deref())
    }

    /// True when every dependency of `task` has completed
    pub fn is_task_ready(&self, task: &TaskDefinition) -> bool {
        task.dependencies()
            .all(|dep| self.task_status(dep) == TaskStatus::Completed)
    }
}

/// Progress counters derived from a workflow state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowProgress {
    pub total_tasks: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
    pub pending: usize,
    /// Completed tasks as a percentage of the total
    pub progress_percent: f64,
    pub status: WorkflowStatus,
}

/// Routing entry describing one configured executor id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRouting {
    /// Executor id (e.g. "code-analyzer")
    pub agent_type: String,
    /// Capabilities this executor provides
    pub capabilities: Vec<AgentCapability>,
    /// Routing priority, 1-10 (higher is preferred)
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Advisory concurrency cap for this executor id (>= 1)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,
}

fn default_max_concurrent() -> usize {
    1
}

impl AgentRouting {
    pub fn new(agent_type: impl Into<String>, capabilities: Vec<AgentCapability>) -> Self {
        Self {
            agent_type: agent_type.into(),
            capabilities,
            priority: default_priority(),
            max_concurrent_tasks: default_max_concurrent(),
        }
    }
}

/// Structured configuration for the orchestration core.
///
/// Passed in by the caller; the core defines no environment variables or
/// other ambient configuration sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationConfig {
    /// Executor routing table consulted by the router
    pub agent_routing: Vec<AgentRouting>,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            agent_routing: crate::routing::default_routing(),
        }
    }
}
