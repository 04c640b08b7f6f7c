use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::condition::{CompletedReference, ConditionEvaluator};
use crate::error::{Result, WorkflowError};
use crate::models::{
    TaskDefinition, TaskResult, TaskStatus, WorkflowDefinition, WorkflowProgress, WorkflowState,
    WorkflowStatus,
};

/// Skip reason recorded when a conditional task's predicate evaluates false
pub const SKIP_CONDITION_NOT_MET: &str = "Condition not met";

/// Per-workflow state store.
///
/// Owns the mutable [`WorkflowState`] for one workflow execution. Every
/// transition primitive runs under a single internal mutex so that concurrent
/// driver callbacks observe a consistent view; reads hand out value snapshots.
/// The lock is never held across an await point: executors and drivers call
/// in, transition, and leave.
///
/// Set-membership invariants maintained by the primitives:
/// - `pending`, `current`, `completed`, and `failed` are pairwise disjoint
/// - a skipped task appears in `task_results` but in none of the four lists
/// - a task enters `current` only via [`StateStore::start_task`]
pub struct StateStore {
    workflow: Arc<WorkflowDefinition>,
    evaluator: Box<dyn ConditionEvaluator>,
    inner: Mutex<WorkflowState>,
}

impl StateStore {
    /// Create a state store with the default condition evaluator
    pub fn new(workflow: Arc<WorkflowDefinition>) -> Self {
        Self::with_evaluator(workflow, Box::new(CompletedReference))
    }

    /// Create a state store with a custom condition evaluator
    pub fn with_evaluator(
        workflow: Arc<WorkflowDefinition>,
        evaluator: Box<dyn ConditionEvaluator>,
    ) -> Self {
        let state = WorkflowState::new(&workflow);
        Self {
            workflow,
            evaluator,
            inner: Mutex::new(state),
        }
    }

    /// The workflow definition this store tracks
    pub fn workflow(&self) -> &WorkflowDefinition {
        &self.workflow
    }

    /// Look up a task definition by id
    pub fn task(&self, task_id: &str) -> Option<&TaskDefinition> {
        self.workflow.task(task_id)
    }

    /// Value snapshot of the current state, safe to hand to callbacks
    pub fn snapshot(&self) -> WorkflowState {
        self.inner.lock().clone()
    }

    /// Current overall workflow status
    pub fn status(&self) -> WorkflowStatus {
        self.inner.lock().status
    }

    /// Current status of a single task
    pub fn task_status(&self, task_id: &str) -> TaskStatus {
        self.inner.lock().task_status(task_id)
    }

    /// Clone of a task's result, if it has started
    pub fn task_result(&self, task_id: &str) -> Option<TaskResult> {
        self.inner.lock().task_results.get(task_id).cloned()
    }

    /// Mark the workflow as started
    pub fn start_workflow(&self) {
        let mut state = self.inner.lock();
        state.status = WorkflowStatus::Running;
        state.started_at = Some(Utc::now());
        tracing::info!(workflow_id = %state.workflow_id, "workflow started");
    }

    /// Terminal transition: the workflow completed
    pub fn complete_workflow(&self) {
        let mut state = self.inner.lock();
        state.status = WorkflowStatus::Completed;
        state.completed_at = Some(Utc::now());
        tracing::info!(workflow_id = %state.workflow_id, "workflow completed");
    }

    /// Terminal transition: the workflow failed
    pub fn fail_workflow(&self, error: &str) {
        let mut state = self.inner.lock();
        state.status = WorkflowStatus::Failed;
        state.error = Some(error.to_string());
        state.completed_at = Some(Utc::now());
        tracing::warn!(workflow_id = %state.workflow_id, error, "workflow failed");
    }

    /// Terminal transition chosen from the task outcomes.
    ///
    /// `completed` iff no task failed; `partial` iff `continue_on_failure`
    /// was set and both completions and failures occurred; `failed` otherwise.
    pub fn finish_workflow(&self) {
        let mut state = self.inner.lock();
        let any_failed = !state.failed_tasks.is_empty();
        let any_completed = !state.completed_tasks.is_empty();
        state.completed_at = Some(Utc::now());
        if !any_failed {
            state.status = WorkflowStatus::Completed;
        } else if self.workflow.continue_on_failure && any_completed {
            state.status = WorkflowStatus::Partial;
        } else {
            state.status = WorkflowStatus::Failed;
            state.error = Some("One or more tasks failed".to_string());
        }
        tracing::info!(
            workflow_id = %state.workflow_id,
            status = %state.status,
            "workflow finished"
        );
    }

    /// Tasks still pending whose dependencies are all completed.
    ///
    /// Conditional tasks whose predicate evaluates false are skipped in place
    /// (with [`SKIP_CONDITION_NOT_MET`]) and excluded from the returned list.
    pub fn ready_tasks(&self) -> Vec<TaskDefinition> {
        let mut state = self.inner.lock();
        let mut ready = Vec::new();
        for task in &self.workflow.tasks {
            if !state.pending_tasks.iter().any(|id| id == &task.id) {
                continue;
            }
            if !state.is_task_ready(task) {
                continue;
            }
            if let Some(condition) = &task.condition {
                if !self.evaluator.evaluate(condition, &state) {
                    skip_in_place(&mut state, &task.id, SKIP_CONDITION_NOT_MET);
                    continue;
                }
            }
            ready.push(task.clone());
        }
        ready
    }

    /// True when every dependency of `task` has completed
    pub fn dependencies_satisfied(&self, task: &TaskDefinition) -> bool {
        self.inner.lock().is_task_ready(task)
    }

    /// Evaluate a condition expression against the current state
    pub fn evaluate_condition(&self, condition: &str) -> bool {
        let state = self.inner.lock();
        self.evaluator.evaluate(condition, &state)
    }

    /// Move a task from `pending` to `current` and stamp its result running
    pub fn start_task(&self, task_id: &str) {
        let mut state = self.inner.lock();
        remove_id(&mut state.pending_tasks, task_id);
        push_unique(&mut state.current_tasks, task_id);
        let now = Utc::now();
        match state.task_results.get_mut(task_id) {
            Some(result) => {
                result.status = TaskStatus::Running;
                result.started_at = Some(now);
            }
            None => {
                state
                    .task_results
                    .insert(task_id.to_string(), TaskResult::running(task_id, now));
            }
        }
        tracing::debug!(task_id, "task started");
    }

    /// Move a task from `current` to `completed` and record its output
    pub fn complete_task(&self, task_id: &str, output: impl Into<String>, agent_used: Option<String>) {
        let mut state = self.inner.lock();
        remove_id(&mut state.current_tasks, task_id);
        push_unique(&mut state.completed_tasks, task_id);
        if let Some(result) = state.task_results.get_mut(task_id) {
            result.status = TaskStatus::Completed;
            result.output = Some(output.into());
            result.agent_used = agent_used;
            close_result(result, Utc::now());
        }
        tracing::debug!(task_id, "task completed");
    }

    /// Move a task from `current` to `failed` and record the error
    pub fn fail_task(&self, task_id: &str, error: &str) {
        let mut state = self.inner.lock();
        fail_in_place(&mut state, task_id, error);
        tracing::debug!(task_id, error, "task failed");
    }

    /// Return a task to `pending` for another attempt.
    ///
    /// The id is removed from `current` and `failed` (wherever it is) so the
    /// membership lists stay disjoint; the result is stamped `retrying` and
    /// its retry counter incremented. The driver issues a fresh
    /// [`StateStore::start_task`] for the next attempt.
    pub fn retry_task(&self, task_id: &str) {
        let mut state = self.inner.lock();
        remove_id(&mut state.current_tasks, task_id);
        remove_id(&mut state.failed_tasks, task_id);
        push_unique(&mut state.pending_tasks, task_id);
        if let Some(result) = state.task_results.get_mut(task_id) {
            result.status = TaskStatus::Retrying;
            result.retry_count += 1;
        }
        tracing::debug!(task_id, "task scheduled for retry");
    }

    /// Remove a task from `pending` and record a terminal skipped result
    pub fn skip_task(&self, task_id: &str, reason: &str) {
        let mut state = self.inner.lock();
        skip_in_place(&mut state, task_id, reason);
        tracing::debug!(task_id, reason, "task skipped");
    }

    /// Mark every task in the workflow as failed with the same error.
    ///
    /// Used for workflow-fatal errors such as a dependency cycle.
    pub fn mark_all_failed(&self, error: &str) {
        let mut state = self.inner.lock();
        for task in &self.workflow.tasks {
            remove_id(&mut state.pending_tasks, &task.id);
            fail_in_place(&mut state, &task.id, error);
        }
    }

    /// Fail every task still in `current`, preserving invariants after a
    /// workflow-level timeout or cancellation
    pub fn fail_inflight(&self, error: &str) {
        let mut state = self.inner.lock();
        let inflight: Vec<String> = state.current_tasks.clone();
        for task_id in inflight {
            fail_in_place(&mut state, &task_id, error);
        }
    }

    /// True when `pending` and `current` are both empty
    pub fn is_complete(&self) -> bool {
        let state = self.inner.lock();
        state.pending_tasks.is_empty() && state.current_tasks.is_empty()
    }

    /// True when at least one task has failed
    pub fn has_failed_tasks(&self) -> bool {
        !self.inner.lock().failed_tasks.is_empty()
    }

    /// Progress counters for the workflow
    pub fn progress(&self) -> WorkflowProgress {
        let state = self.inner.lock();
        let total_tasks = self.workflow.tasks.len();
        let completed = state.completed_tasks.len();
        WorkflowProgress {
            total_tasks,
            completed,
            failed: state.failed_tasks.len(),
            running: state.current_tasks.len(),
            pending: state.pending_tasks.len(),
            progress_percent: if total_tasks > 0 {
                completed as f64 / total_tasks as f64 * 100.0
            } else {
                0.0
            },
            status: state.status,
        }
    }

    /// Kahn's algorithm over the static dependency graph.
    ///
    /// Returns task ids in an order where every task appears after all of its
    /// dependencies, or a cycle error when no such order exists. Dependencies
    /// on ids the workflow does not define are ignored here; validation
    /// rejects them before execution.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let tasks = &self.workflow.tasks;
        let known: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        let mut in_degree: HashMap<&str, usize> =
            tasks.iter().map(|t| (t.id.as_str(), 0)).collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for task in tasks {
            for dep in task.dependencies() {
                if known.contains(dep) {
                    if let Some(degree) = in_degree.get_mut(task.id.as_str()) {
                        *degree += 1;
                    }
                    dependents.entry(dep).or_default().push(task.id.as_str());
                }
            }
        }

        let mut queue: VecDeque<&str> = tasks
            .iter()
            .map(|t| t.id.as_str())
            .filter(|id| in_degree.get(id).copied() == Some(0))
            .collect();
        let mut order = Vec::with_capacity(tasks.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            if let Some(children) = dependents.get(id) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(child);
                        }
                    }
                }
            }
        }

        if order.len() != tasks.len() {
            return Err(WorkflowError::cycle(self.workflow.id.as_str()));
        }
        Ok(order)
    }

    /// Full transitive dependency list for a task, dependencies first,
    /// including the task itself
    pub fn dependency_chain(&self, task_id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        self.traverse_dependencies(task_id, &mut visited, &mut chain);
        chain
    }

    fn traverse_dependencies(
        &self,
        task_id: &str,
        visited: &mut HashSet<String>,
        chain: &mut Vec<String>,
    ) {
        if !visited.insert(task_id.to_string()) {
            return;
        }
        if let Some(task) = self.workflow.task(task_id) {
            for dep in task.dependencies() {
                self.traverse_dependencies(dep, visited, chain);
            }
            chain.push(task_id.to_string());
        }
    }
}

fn remove_id(list: &mut Vec<String>, task_id: &str) {
    list.retain(|id| id != task_id);
}

fn push_unique(list: &mut Vec<String>, task_id: &str) {
    if !list.iter().any(|id| id == task_id) {
        list.push(task_id.to_string());
    }
}

fn close_result(result: &mut TaskResult, completed_at: DateTime<Utc>) {
    result.completed_at = Some(completed_at);
    if let Some(started_at) = result.started_at {
        let elapsed = (completed_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        result.duration_seconds = Some(elapsed);
    }
}

fn fail_in_place(state: &mut WorkflowState, task_id: &str, error: &str) {
    remove_id(&mut state.current_tasks, task_id);
    push_unique(&mut state.failed_tasks, task_id);
    let now = Utc::now();
    match state.task_results.get_mut(task_id) {
        Some(result) => {
            result.status = TaskStatus::Failed;
            result.error = Some(error.to_string());
            close_result(result, now);
        }
        None => {
            let mut result = TaskResult::running(task_id, now);
            result.status = TaskStatus::Failed;
            result.error = Some(error.to_string());
            close_result(&mut result, now);
            state.task_results.insert(task_id.to_string(), result);
        }
    }
}

fn skip_in_place(state: &mut WorkflowState, task_id: &str, reason: &str) {
    remove_id(&mut state.pending_tasks, task_id);
    match state.task_results.get_mut(task_id) {
        Some(result) => {
            result.status = TaskStatus::Skipped;
            result.error = Some(reason.to_string());
        }
        None => {
            let now = Utc::now();
            let mut result = TaskResult::running(task_id, now);
            result.status = TaskStatus::Skipped;
            result.error = Some(reason.to_string());
            result.completed_at = Some(now);
            result.duration_seconds = Some(0.0);
            state.task_results.insert(task_id.to_string(), result);
        }
    }
}
