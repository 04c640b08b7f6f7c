use std::collections::HashMap;

use parking_lot::Mutex;

use crate::models::{AgentCapability, AgentRouting, TaskDefinition};

/// Reserved executor id used when no configured executor matches a task's
/// capability requirements
pub const FALLBACK_AGENT_TYPE: &str = "general-purpose";

/// Capability-based task router with per-executor load accounting.
///
/// Given a task, the router picks an executor id whose capability set covers
/// the task's requirements, preferring lightly loaded, high-priority, and
/// more specific executors in that order. Load counters are advisory: a
/// saturated executor is still assigned when nothing better exists, so
/// correctness never depends on the caps.
///
/// The router is shared by concurrent drivers; the load table sits behind its
/// own mutex and every method takes `&self`.
pub struct TaskRouter {
    routing: Vec<AgentRouting>,
    load: Mutex<HashMap<String, usize>>,
}

impl TaskRouter {
    /// Create a router over a routing table
    pub fn new(routing: Vec<AgentRouting>) -> Self {
        Self {
            routing,
            load: Mutex::new(HashMap::new()),
        }
    }

    /// Route a task to an executor id.
    ///
    /// Selection order:
    /// 1. An explicit `task.agent_type` is returned verbatim.
    /// 2. Executors whose capability set is a superset of the task's
    ///    requirements are candidates; with no candidates the reserved
    ///    [`FALLBACK_AGENT_TYPE`] is returned.
    /// 3. Candidates below their concurrency cap are preferred; if all are
    ///    saturated, every candidate stays in play.
    /// 4. Sort by ascending load, then descending priority, then descending
    ///    capability-set size; the first entry wins.
    pub fn route_task(&self, task: &TaskDefinition) -> String {
        if let Some(agent_type) = &task.agent_type {
            return agent_type.clone();
        }

        let suitable: Vec<&AgentRouting> = self
            .routing
            .iter()
            .filter(|agent| provides_all(agent, &task.required_capabilities))
            .collect();
        if suitable.is_empty() {
            tracing::debug!(
                task_id = %task.id,
                "no executor matches required capabilities, using fallback"
            );
            return FALLBACK_AGENT_TYPE.to_string();
        }

        let load = self.load.lock();
        let mut available: Vec<&AgentRouting> = suitable
            .iter()
            .copied()
            .filter(|agent| {
                load.get(&agent.agent_type).copied().unwrap_or(0) < agent.max_concurrent_tasks
            })
            .collect();
        if available.is_empty() {
            available = suitable;
        }

        available.sort_by(|a, b| {
            let load_a = load.get(&a.agent_type).copied().unwrap_or(0);
            let load_b = load.get(&b.agent_type).copied().unwrap_or(0);
            load_a
                .cmp(&load_b)
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| b.capabilities.len().cmp(&a.capabilities.len()))
        });

        available[0].agent_type.clone()
    }

    /// Increment the in-flight count for an executor id
    pub fn increment_load(&self, agent_type: &str) {
        let mut load = self.load.lock();
        *load.entry(agent_type.to_string()).or_insert(0) += 1;
    }

    /// Decrement the in-flight count for an executor id; never goes negative
    pub fn decrement_load(&self, agent_type: &str) {
        let mut load = self.load.lock();
        if let Some(count) = load.get_mut(agent_type) {
            *count = count.saturating_sub(1);
        }
    }

    /// Current in-flight count for an executor id
    pub fn load(&self, agent_type: &str) -> usize {
        self.load.lock().get(agent_type).copied().unwrap_or(0)
    }

    /// Snapshot of all load counters
    pub fn load_summary(&self) -> HashMap<String, usize> {
        self.load.lock().clone()
    }

    /// Reset every load counter to zero
    pub fn reset_load(&self) {
        self.load.lock().clear();
    }
}

fn provides_all(agent: &AgentRouting, required: &[AgentCapability]) -> bool {
    required
        .iter()
        .all(|capability| agent.capabilities.contains(capability))
}

/// Default routing table covering the common executor ids
pub fn default_routing() -> Vec<AgentRouting> {
    vec![
        AgentRouting {
            agent_type: "general-purpose".to_string(),
            capabilities: vec![AgentCapability::General],
            priority: 5,
            max_concurrent_tasks: 3,
        },
        AgentRouting {
            agent_type: "code-analyzer".to_string(),
            capabilities: vec![
                AgentCapability::CodeAnalysis,
                AgentCapability::Debugging,
                AgentCapability::General,
            ],
            priority: 7,
            max_concurrent_tasks: 2,
        },
        AgentRouting {
            agent_type: "code-generator".to_string(),
            capabilities: vec![AgentCapability::CodeGeneration, AgentCapability::General],
            priority: 7,
            max_concurrent_tasks: 2,
        },
        AgentRouting {
            agent_type: "test-specialist".to_string(),
            capabilities: vec![
                AgentCapability::Testing,
                AgentCapability::CodeAnalysis,
                AgentCapability::General,
            ],
            priority: 6,
            max_concurrent_tasks: 2,
        },
        AgentRouting {
            agent_type: "doc-writer".to_string(),
            capabilities: vec![AgentCapability::Documentation, AgentCapability::General],
            priority: 6,
            max_concurrent_tasks: 2,
        },
        AgentRouting {
            agent_type: "data-processor".to_string(),
            capabilities: vec![
                AgentCapability::DataProcessing,
                AgentCapability::FileOperations,
                AgentCapability::General,
            ],
            priority: 6,
            max_concurrent_tasks: 2,
        },
        AgentRouting {
            agent_type: "researcher".to_string(),
            capabilities: vec![AgentCapability::Research, AgentCapability::General],
            priority: 5,
            max_concurrent_tasks: 3,
        },
    ]
}
