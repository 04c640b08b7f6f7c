use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use workflow_core::models::{ExecutionStrategy, TaskDefinition, TaskResult, TaskStatus};
use workflow_core::StateStore;

/// Skip reason recorded when fail-fast cuts off the rest of a workflow
pub const SKIP_PREVIOUS_FAILURE: &str = "Previous task failed";

/// Skip reason recorded by the conditional executor for unmet dependencies
pub const SKIP_UNSATISFIED_DEPENDENCIES: &str = "Dependencies not satisfied";

/// The per-task driver supplied by the coordinator.
///
/// `run` returns only after the task has reached a terminal status in the
/// state store; the driver performs its own routing, retries, and error
/// recording. It is safe to invoke concurrently for different tasks.
#[async_trait]
pub trait TaskDriver: Send + Sync {
    /// Drive one task to a terminal status and return its result
    async fn run(&self, task: &TaskDefinition) -> TaskResult;
}

/// An executor for one scheduling strategy, constructed per workflow run.
///
/// All four variants share the same driver; they differ only in when the
/// driver is called.
pub enum Executor {
    Sequential(SequentialExecutor),
    Parallel(ParallelExecutor),
    Dag(DagExecutor),
    Conditional(ConditionalExecutor),
}

impl Executor {
    /// Build the executor matching a strategy
    pub fn for_strategy(
        strategy: ExecutionStrategy,
        store: Arc<StateStore>,
        driver: Arc<dyn TaskDriver>,
        max_parallel: usize,
    ) -> Self {
        match strategy {
            ExecutionStrategy::Sequential => {
                Executor::Sequential(SequentialExecutor { store, driver })
            }
            ExecutionStrategy::Parallel => Executor::Parallel(ParallelExecutor {
                store,
                driver,
                max_parallel,
            }),
            ExecutionStrategy::Dag => Executor::Dag(DagExecutor {
                store,
                driver,
                max_parallel,
            }),
            ExecutionStrategy::Conditional => {
                Executor::Conditional(ConditionalExecutor { store, driver })
            }
        }
    }

    /// Run the workflow to completion under this executor's discipline
    pub async fn execute(&self) -> HashMap<String, TaskResult> {
        match self {
            Executor::Sequential(executor) => executor.execute().await,
            Executor::Parallel(executor) => executor.execute().await,
            Executor::Dag(executor) => executor.execute().await,
            Executor::Conditional(executor) => executor.execute().await,
        }
    }
}

/// Executes tasks one at a time in declaration order
pub struct SequentialExecutor {
    store: Arc<StateStore>,
    driver: Arc<dyn TaskDriver>,
}

impl SequentialExecutor {
    pub async fn execute(&self) -> HashMap<String, TaskResult> {
        let workflow = self.store.workflow();
        for task in &workflow.tasks {
            if !workflow.continue_on_failure && self.store.has_failed_tasks() {
                self.store.skip_task(&task.id, SKIP_PREVIOUS_FAILURE);
                continue;
            }
            self.driver.run(task).await;
        }
        self.store.snapshot().task_results
    }
}

/// Launches every task concurrently behind a semaphore of size
/// `max_parallel`. Dependencies are not consulted, so pick this strategy
/// only when all tasks are independent.
pub struct ParallelExecutor {
    store: Arc<StateStore>,
    driver: Arc<dyn TaskDriver>,
    max_parallel: usize,
}

impl ParallelExecutor {
    pub async fn execute(&self) -> HashMap<String, TaskResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut inflight: JoinSet<()> = JoinSet::new();
        let mut inflight_ids: HashMap<tokio::task::Id, String> = HashMap::new();

        for task in &self.store.workflow().tasks {
            let semaphore = semaphore.clone();
            let driver = self.driver.clone();
            let task = task.clone();
            let task_id = task.id.clone();
            let handle = inflight.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                driver.run(&task).await;
            });
            inflight_ids.insert(handle.id(), task_id);
        }

        while let Some(joined) = inflight.join_next_with_id().await {
            record_join_outcome(&self.store, &mut inflight_ids, joined);
        }
        self.store.snapshot().task_results
    }
}

/// Dependency-ordered execution with bounded concurrency.
///
/// Validates the graph up front, then repeatedly launches ready tasks as
/// supervised children and waits for the first completion. A task id is
/// handed to the driver at most once, even while a retrying task is
/// temporarily back in the pending list.
pub struct DagExecutor {
    store: Arc<StateStore>,
    driver: Arc<dyn TaskDriver>,
    max_parallel: usize,
}

impl DagExecutor {
    pub async fn execute(&self) -> HashMap<String, TaskResult> {
        let workflow = self.store.workflow();
        if let Err(err) = self.store.topological_sort() {
            tracing::error!(workflow_id = %workflow.id, error = %err, "dependency cycle detected");
            self.store.mark_all_failed(&err.to_string());
            return self.store.snapshot().task_results;
        }

        let mut inflight: JoinSet<()> = JoinSet::new();
        let mut inflight_ids: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut launched: HashSet<String> = HashSet::new();

        while !self.store.is_complete() {
            let mut ready: Vec<TaskDefinition> = self
                .store
                .ready_tasks()
                .into_iter()
                .filter(|task| !launched.contains(&task.id))
                .collect();

            if !workflow.continue_on_failure && self.store.has_failed_tasks() {
                for task in &ready {
                    self.store.skip_task(&task.id, SKIP_PREVIOUS_FAILURE);
                }
                while let Some(joined) = inflight.join_next_with_id().await {
                    record_join_outcome(&self.store, &mut inflight_ids, joined);
                }
                break;
            }

            while !ready.is_empty() && inflight.len() < self.max_parallel {
                let task = ready.remove(0);
                launched.insert(task.id.clone());
                let driver = self.driver.clone();
                let task_id = task.id.clone();
                let handle = inflight.spawn(async move {
                    driver.run(&task).await;
                });
                inflight_ids.insert(handle.id(), task_id);
            }

            if !inflight.is_empty() {
                if let Some(joined) = inflight.join_next_with_id().await {
                    record_join_outcome(&self.store, &mut inflight_ids, joined);
                }
            } else if ready.is_empty() {
                // nothing running and nothing launchable: unreachable tasks
                // remain pending, so leave instead of spinning
                break;
            }
        }
        self.store.snapshot().task_results
    }
}

/// Declaration-order execution with skip points for unmet dependencies and
/// false conditions. For linear cascades, not true DAGs.
pub struct ConditionalExecutor {
    store: Arc<StateStore>,
    driver: Arc<dyn TaskDriver>,
}

impl ConditionalExecutor {
    pub async fn execute(&self) -> HashMap<String, TaskResult> {
        let workflow = self.store.workflow();
        for task in &workflow.tasks {
            if !self.store.dependencies_satisfied(task) {
                self.store.skip_task(&task.id, SKIP_UNSATISFIED_DEPENDENCIES);
                continue;
            }
            if let Some(condition) = &task.condition {
                if !self.store.evaluate_condition(condition) {
                    self.store
                        .skip_task(&task.id, workflow_core::SKIP_CONDITION_NOT_MET);
                    continue;
                }
            }
            if !workflow.continue_on_failure && self.store.has_failed_tasks() {
                self.store.skip_task(&task.id, SKIP_PREVIOUS_FAILURE);
                continue;
            }
            self.driver.run(task).await;
        }
        self.store.snapshot().task_results
    }
}

/// If a supervised child died without recording a terminal status (a panic in
/// the driver), mark the task failed so state invariants survive driver bugs.
fn record_join_outcome(
    store: &StateStore,
    inflight_ids: &mut HashMap<tokio::task::Id, String>,
    joined: Result<(tokio::task::Id, ()), JoinError>,
) {
    match joined {
        Ok((id, ())) => {
            inflight_ids.remove(&id);
        }
        Err(err) => {
            if let Some(task_id) = inflight_ids.remove(&err.id()) {
                if store.task_status(&task_id) == TaskStatus::Running {
                    store.fail_task(&task_id, &format!("task aborted: {err}"));
                }
            }
        }
    }
}
