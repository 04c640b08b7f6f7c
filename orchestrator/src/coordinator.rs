use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

use result_cache::ResultCache;
use workflow_core::models::{
    OrchestrationConfig, TaskDefinition, TaskResult, TaskStatus, WorkflowDefinition,
    WorkflowProgress, WorkflowState, WorkflowStatus,
};
use workflow_core::{
    AgentContext, AgentSubstrate, Result, StateStore, TaskRouter, WorkflowError, WorkflowValidator,
};

use crate::executor::{Executor, TaskDriver};
use crate::strategy::recommend_strategy;

/// Callback invoked with a state snapshot after every transition.
///
/// Must not block and must not assume ordering across concurrent tasks.
pub type ProgressCallback = Arc<dyn Fn(&WorkflowState) + Send + Sync>;

/// Central coordinator for workflow execution.
///
/// Owns the router, the result cache, and the agent substrates, and drives
/// each submitted workflow through validation, strategy selection, executor
/// construction, and terminal-status bookkeeping. Execution state for every
/// submitted workflow stays queryable through [`WorkflowCoordinator::workflow_state`]
/// until the coordinator is dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use orchestrator::WorkflowCoordinator;
/// use workflow_core::models::{TaskDefinition, WorkflowDefinition};
/// # use workflow_core::{AgentContext, AgentResponse, AgentSubstrate};
/// # struct MyAgent;
/// # #[async_trait::async_trait]
/// # impl AgentSubstrate for MyAgent {
/// #     async fn run(&self, prompt: &str, _ctx: &AgentContext) -> workflow_core::Result<AgentResponse> {
/// #         Ok(AgentResponse::new(prompt))
/// #     }
/// # }
///
/// # async fn example() -> workflow_core::Result<()> {
/// let coordinator = WorkflowCoordinator::new(Arc::new(MyAgent));
/// let workflow = WorkflowDefinition::new(
///     "wf-1",
///     "Example",
///     vec![TaskDefinition::new("hello", "Say hello")],
/// );
/// let state = coordinator.execute_workflow(workflow, None, false).await?;
/// println!("{}", state.status);
/// # Ok(())
/// # }
/// ```
pub struct WorkflowCoordinator {
    default_substrate: Arc<dyn AgentSubstrate>,
    substrates: HashMap<String, Arc<dyn AgentSubstrate>>,
    router: Arc<TaskRouter>,
    cache: Arc<ResultCache>,
    workflows: Mutex<HashMap<String, WorkflowHandle>>,
}

/// Registry entry for a submitted workflow: its state store plus the
/// cancellation signal observed by the running execution
struct WorkflowHandle {
    store: Arc<StateStore>,
    cancel: Arc<CancelSignal>,
}

/// Cooperative cancellation signal shared between
/// [`WorkflowCoordinator::cancel_workflow`] and the running execution.
///
/// The executor future is raced against [`CancelSignal::cancelled`]; when
/// the signal fires the executor is dropped, which aborts every in-flight
/// driver at its next suspension point.
struct CancelSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the signal has fired
    async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.notify.notified();
            // the flag may have been set between the check and registering
            if self.is_cancelled() {
                break;
            }
            notified.await;
        }
    }
}

/// How a workflow execution left its executor
enum ExecutorExit {
    Ran,
    Cancelled,
    DeadlineExpired(f64),
}

impl WorkflowCoordinator {
    /// Create a coordinator with the default routing table and no cache
    pub fn new(substrate: Arc<dyn AgentSubstrate>) -> Self {
        Self::with_config(substrate, OrchestrationConfig::default())
    }

    /// Create a coordinator with an explicit configuration
    pub fn with_config(substrate: Arc<dyn AgentSubstrate>, config: OrchestrationConfig) -> Self {
        Self {
            default_substrate: substrate,
            substrates: HashMap::new(),
            router: Arc::new(TaskRouter::new(config.agent_routing)),
            cache: Arc::new(ResultCache::disabled()),
            workflows: Mutex::new(HashMap::new()),
        }
    }

    /// Register a substrate for a specific executor id; tasks routed to that
    /// id are handed to it instead of the default substrate
    pub fn with_substrate(
        mut self,
        agent_type: impl Into<String>,
        substrate: Arc<dyn AgentSubstrate>,
    ) -> Self {
        self.substrates.insert(agent_type.into(), substrate);
        self
    }

    /// Enable result caching
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    /// The router, for load introspection
    pub fn router(&self) -> &TaskRouter {
        &self.router
    }

    /// The result cache, for statistics and invalidation
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Execute a workflow to a terminal state.
    ///
    /// Validates the definition first and returns a `Validation` error
    /// without touching any state if it is malformed. Otherwise every
    /// failure is folded into the returned [`WorkflowState`].
    ///
    /// With `auto_strategy` set, the strategy selector picks the scheduling
    /// discipline instead of the declared one. The progress callback fires
    /// after every state transition and once more when the workflow reaches
    /// its terminal status.
    pub async fn execute_workflow(
        &self,
        workflow: WorkflowDefinition,
        progress: Option<ProgressCallback>,
        auto_strategy: bool,
    ) -> Result<WorkflowState> {
        WorkflowValidator::validate_workflow(&workflow)?;

        let strategy = if auto_strategy {
            recommend_strategy(&workflow)
        } else {
            workflow.execution_strategy
        };

        let workflow = Arc::new(workflow);
        let store = Arc::new(StateStore::new(workflow.clone()));
        let cancel = Arc::new(CancelSignal::new());
        self.workflows.lock().insert(
            workflow.id.clone(),
            WorkflowHandle {
                store: store.clone(),
                cancel: cancel.clone(),
            },
        );

        tracing::info!(
            workflow_id = %workflow.id,
            strategy = %strategy,
            tasks = workflow.tasks.len(),
            "executing workflow"
        );
        store.start_workflow();

        let driver: Arc<dyn TaskDriver> = Arc::new(CoordinatorDriver {
            workflow_id: workflow.id.clone(),
            store: store.clone(),
            router: self.router.clone(),
            cache: self.cache.clone(),
            default_substrate: self.default_substrate.clone(),
            substrates: self.substrates.clone(),
            progress: progress.clone(),
        });
        let executor =
            Executor::for_strategy(strategy, store.clone(), driver, workflow.max_parallel_tasks);

        // racing the executor against the cancellation signal means a cancel
        // drops the executor future, aborting every in-flight driver exactly
        // like an expired deadline does
        let guarded = async {
            tokio::select! {
                _ = executor.execute() => ExecutorExit::Ran,
                _ = cancel.cancelled() => ExecutorExit::Cancelled,
            }
        };
        let exit = match workflow.default_timeout_seconds {
            Some(deadline) => match timeout(Duration::from_secs_f64(deadline), guarded).await {
                Ok(exit) => exit,
                Err(_) => ExecutorExit::DeadlineExpired(deadline),
            },
            None => guarded.await,
        };

        match exit {
            ExecutorExit::Ran => {}
            ExecutorExit::Cancelled => {
                let err = WorkflowError::cancelled(format!("workflow '{}'", workflow.id));
                store.fail_inflight(&err.to_string());
                if store.status() == WorkflowStatus::Running {
                    store.fail_workflow("Workflow cancelled");
                }
            }
            ExecutorExit::DeadlineExpired(deadline) => {
                let err = WorkflowError::WorkflowTimeout(deadline);
                store.fail_inflight(&err.to_string());
                store.fail_workflow(&err.to_string());
            }
        }

        // a deadline or external cancellation has already finalized the state
        if store.status() == WorkflowStatus::Running {
            store.finish_workflow();
        }
        if let Some(callback) = &progress {
            callback(&store.snapshot());
        }
        Ok(store.snapshot())
    }

    /// Execute a single task outside of a larger workflow
    pub async fn execute_task(
        &self,
        task: TaskDefinition,
        workflow_id: impl Into<String>,
    ) -> Result<TaskResult> {
        let task_id = task.id.clone();
        let workflow = WorkflowDefinition::new(workflow_id.into(), "Ad-hoc Task", vec![task]);
        let state = self.execute_workflow(workflow, None, false).await?;
        state
            .task_results
            .get(&task_id)
            .cloned()
            .ok_or(WorkflowError::UnknownTask(task_id))
    }

    /// Snapshot of a submitted workflow's state
    pub fn workflow_state(&self, workflow_id: &str) -> Option<WorkflowState> {
        self.workflows
            .lock()
            .get(workflow_id)
            .map(|handle| handle.store.snapshot())
    }

    /// Progress counters for a submitted workflow
    pub fn workflow_progress(&self, workflow_id: &str) -> Option<WorkflowProgress> {
        self.workflows
            .lock()
            .get(workflow_id)
            .map(|handle| handle.store.progress())
    }

    /// Cancel a workflow that is still running.
    ///
    /// The workflow transitions to `failed` immediately; the running
    /// execution observes the signal, aborts every in-flight driver, and
    /// records a cancellation failure on each task that was in
    /// `current_tasks`. Tasks not yet dispatched are never started.
    ///
    /// Returns whether a cancellation happened; workflows that already
    /// terminated (or were never submitted) are left untouched.
    pub fn cancel_workflow(&self, workflow_id: &str) -> bool {
        let handle = self
            .workflows
            .lock()
            .get(workflow_id)
            .map(|handle| (handle.store.clone(), handle.cancel.clone()));
        match handle {
            Some((store, cancel)) if store.status() == WorkflowStatus::Running => {
                store.fail_workflow("Workflow cancelled");
                cancel.cancel();
                tracing::warn!(workflow_id, "workflow cancelled");
                true
            }
            _ => false,
        }
    }
}

/// Decrements the routed executor's load exactly once, even when the driver
/// future is dropped by a workflow-level deadline.
struct LoadGuard {
    router: Arc<TaskRouter>,
    agent_type: String,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.router.decrement_load(&self.agent_type);
    }
}

/// The per-task driver: routing, caching, the retry loop, and state updates
/// around a single agent invocation.
struct CoordinatorDriver {
    workflow_id: String,
    store: Arc<StateStore>,
    router: Arc<TaskRouter>,
    cache: Arc<ResultCache>,
    default_substrate: Arc<dyn AgentSubstrate>,
    substrates: HashMap<String, Arc<dyn AgentSubstrate>>,
    progress: Option<ProgressCallback>,
}

impl CoordinatorDriver {
    fn emit_progress(&self) {
        if let Some(callback) = &self.progress {
            callback(&self.store.snapshot());
        }
    }

    fn substrate_for(&self, agent_type: &str) -> &Arc<dyn AgentSubstrate> {
        self.substrates
            .get(agent_type)
            .unwrap_or(&self.default_substrate)
    }

    fn terminal_result(&self, task_id: &str) -> TaskResult {
        self.store.task_result(task_id).unwrap_or_else(|| {
            let mut result = TaskResult::running(task_id, chrono::Utc::now());
            result.status = TaskStatus::Failed;
            result.error = Some("task result missing from state store".to_string());
            result
        })
    }
}

#[async_trait]
impl TaskDriver for CoordinatorDriver {
    async fn run(&self, task: &TaskDefinition) -> TaskResult {
        let agent_type = self.router.route_task(task);
        self.router.increment_load(&agent_type);
        let _load = LoadGuard {
            router: self.router.clone(),
            agent_type: agent_type.clone(),
        };
        tracing::debug!(task_id = %task.id, agent_type = %agent_type, "task routed");

        let retry = &task.retry_config;
        let mut attempt: u32 = 0;
        let mut delay = retry.initial_delay;

        loop {
            self.store.start_task(&task.id);
            self.emit_progress();

            // dependency outputs are read from the snapshot taken at the
            // running transition; later mutations do not affect this attempt
            let snapshot = self.store.snapshot();
            let dependency_results = dependency_results(task, &snapshot);

            if let Some(cached) = self.cache.get(task, Some(&dependency_results)) {
                let agent_used = cached.agent_used.clone().or_else(|| Some(agent_type.clone()));
                self.store
                    .complete_task(&task.id, cached.output.unwrap_or_default(), agent_used);
                self.emit_progress();
                tracing::debug!(task_id = %task.id, "task served from cache");
                return self.terminal_result(&task.id);
            }

            let prompt = build_task_prompt(task, &snapshot);
            let context = AgentContext {
                workflow_id: self.workflow_id.clone(),
                task_id: task.id.clone(),
                agent_type: agent_type.clone(),
                required_skills: task.required_skills.clone(),
            };
            let substrate = self.substrate_for(&agent_type);
            let outcome = match task.timeout_seconds {
                Some(deadline) => {
                    match timeout(
                        Duration::from_secs_f64(deadline),
                        substrate.run(&prompt, &context),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(WorkflowError::task_timeout(&task.id, deadline)),
                    }
                }
                None => substrate.run(&prompt, &context).await,
            };

            match outcome {
                Ok(response) => {
                    let agent_used = response.agent_used.unwrap_or_else(|| agent_type.clone());
                    self.store
                        .complete_task(&task.id, response.output, Some(agent_used));
                    if let Some(result) = self.store.task_result(&task.id) {
                        self.cache.put(task, &result, Some(&dependency_results));
                    }
                    self.emit_progress();
                    return self.terminal_result(&task.id);
                }
                Err(err) if attempt < retry.max_retries && err.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        task_id = %task.id,
                        error = %err,
                        attempt,
                        max_retries = retry.max_retries,
                        "task attempt failed, backing off"
                    );
                    self.store.retry_task(&task.id);
                    self.emit_progress();
                    sleep(Duration::from_secs_f64(delay)).await;
                    delay = (delay * retry.backoff_multiplier).min(retry.max_delay);
                }
                Err(err) => {
                    tracing::warn!(task_id = %task.id, error = %err, "task failed");
                    self.store.fail_task(&task.id, &err.to_string());
                    self.emit_progress();
                    return self.terminal_result(&task.id);
                }
            }
        }
    }
}

/// Completed results of a task's dependencies, keyed by dependency id
fn dependency_results(
    task: &TaskDefinition,
    snapshot: &WorkflowState,
) -> HashMap<String, TaskResult> {
    task.dependencies()
        .filter_map(|dep_id| {
            snapshot
                .task_results
                .get(dep_id)
                .filter(|result| result.status == TaskStatus::Completed)
                .map(|result| (dep_id.to_string(), result.clone()))
        })
        .collect()
}

/// Compose the opaque prompt handed to the agent substrate: the task
/// description, serialized parameters, the outputs of completed
/// dependencies, and the expected output type when set.
fn build_task_prompt(task: &TaskDefinition, snapshot: &WorkflowState) -> String {
    let mut parts = vec![format!("Task: {}", task.description)];

    if !task.parameters.is_empty() {
        parts.push("\nParameters:".to_string());
        for (key, value) in &task.parameters {
            parts.push(format!("- {key}: {}", render_value(value)));
        }
    }

    if task.depends_on.iter().next().is_some() {
        parts.push("\nContext from previous tasks:".to_string());
        for dep_id in task.dependencies() {
            if let Some(result) = snapshot.task_results.get(dep_id) {
                if result.status == TaskStatus::Completed {
                    parts.push(format!("\n{dep_id}:"));
                    parts.push(format!(
                        "  Output: {}",
                        result.output.as_deref().unwrap_or("")
                    ));
                }
            }
        }
    }

    if let Some(expected) = &task.expected_output_type {
        parts.push(format!("\nExpected output format: {expected}"));
    }

    parts.join("\n")
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_core::models::WorkflowDefinition;

    fn snapshot_with_output(dep_id: &str, output: &str) -> WorkflowState {
        let workflow = WorkflowDefinition::new(
            "wf",
            "test",
            vec![TaskDefinition::new(dep_id, "dep task")],
        );
        let mut state = WorkflowState::new(&workflow);
        let mut result = TaskResult::running(dep_id, chrono::Utc::now());
        result.status = TaskStatus::Completed;
        result.output = Some(output.to_string());
        state.task_results.insert(dep_id.to_string(), result);
        state.completed_tasks.push(dep_id.to_string());
        state.pending_tasks.clear();
        state
    }

    #[test]
    fn test_prompt_contains_description_only_for_simple_task() {
        let task = TaskDefinition::new("t", "Summarize the findings");
        let workflow = WorkflowDefinition::new("wf", "test", vec![task.clone()]);
        let snapshot = WorkflowState::new(&workflow);
        let prompt = build_task_prompt(&task, &snapshot);
        assert_eq!(prompt, "Task: Summarize the findings");
    }

    #[test]
    fn test_prompt_includes_parameters_sorted() {
        let mut task = TaskDefinition::new("t", "Process");
        task.parameters
            .insert("format".to_string(), serde_json::json!("csv"));
        task.parameters
            .insert("depth".to_string(), serde_json::json!(2));
        let workflow = WorkflowDefinition::new("wf", "test", vec![task.clone()]);
        let prompt = build_task_prompt(&task, &WorkflowState::new(&workflow));

        assert!(prompt.contains("\nParameters:"));
        let depth_pos = prompt.find("- depth: 2").unwrap();
        let format_pos = prompt.find("- format: csv").unwrap();
        assert!(depth_pos < format_pos);
    }

    #[test]
    fn test_prompt_includes_dependency_context() {
        let mut task = TaskDefinition::new("summarize", "Summarize");
        task.depends_on = vec!["analyze".to_string()];
        let snapshot = snapshot_with_output("analyze", "42 findings");
        let prompt = build_task_prompt(&task, &snapshot);

        assert!(prompt.contains("Context from previous tasks:"));
        assert!(prompt.contains("\nanalyze:"));
        assert!(prompt.contains("  Output: 42 findings"));
    }

    #[test]
    fn test_prompt_includes_expected_output_type() {
        let mut task = TaskDefinition::new("t", "Produce a report");
        task.expected_output_type = Some("markdown table".to_string());
        let workflow = WorkflowDefinition::new("wf", "test", vec![task.clone()]);
        let prompt = build_task_prompt(&task, &WorkflowState::new(&workflow));
        assert!(prompt.ends_with("\nExpected output format: markdown table"));
    }

    #[test]
    fn test_dependency_results_filters_incomplete() {
        let mut task = TaskDefinition::new("t", "task");
        task.depends_on = vec!["done".to_string(), "missing".to_string()];
        let snapshot = snapshot_with_output("done", "out");
        let results = dependency_results(&task, &snapshot);
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("done"));
    }
}
