use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use workflow_core::models::{TaskStatus, WorkflowDefinition, WorkflowState};

/// Supported output formats for workflow diagrams
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationFormat {
    /// Mermaid markdown diagram
    Mermaid,
    /// Graphviz DOT format
    Graphviz,
    /// ASCII art for terminals
    Ascii,
    /// JSON structure for custom rendering
    Json,
}

/// Renders a workflow (optionally with its execution state) as a diagram.
///
/// Status coloring: completed is green / `✓`, failed is red / `✗`, running is
/// blue / `⟳`, everything else is yellow / `○`.
pub struct WorkflowVisualizer<'a> {
    workflow: &'a WorkflowDefinition,
    state: Option<&'a WorkflowState>,
}

impl<'a> WorkflowVisualizer<'a> {
    /// Visualize a bare workflow definition
    pub fn new(workflow: &'a WorkflowDefinition) -> Self {
        Self {
            workflow,
            state: None,
        }
    }

    /// Visualize a workflow together with its execution state
    pub fn with_state(workflow: &'a WorkflowDefinition, state: &'a WorkflowState) -> Self {
        Self {
            workflow,
            state: Some(state),
        }
    }

    /// Render the workflow in the requested format
    pub fn render(&self, format: VisualizationFormat, include_metrics: bool) -> String {
        match format {
            VisualizationFormat::Mermaid => self.render_mermaid(include_metrics),
            VisualizationFormat::Graphviz => self.render_graphviz(include_metrics),
            VisualizationFormat::Ascii => self.render_ascii(include_metrics),
            VisualizationFormat::Json => self.render_json(include_metrics),
        }
    }

    fn render_mermaid(&self, include_metrics: bool) -> String {
        let mut lines = vec!["```mermaid".to_string(), "graph TD".to_string()];

        for task in &self.workflow.tasks {
            let node_id = sanitize_id(&task.id);
            let mut label = task.id.clone();
            if include_metrics {
                if let Some(duration) = self.duration_of(&task.id) {
                    label = format!("{}<br/>{duration:.1}s", task.id);
                }
            }
            let class = match self.status_of(&task.id) {
                Some(TaskStatus::Completed) => ":::completed",
                Some(TaskStatus::Failed) => ":::failed",
                Some(TaskStatus::Running) => ":::running",
                Some(_) => ":::pending",
                None => "",
            };
            lines.push(format!("    {node_id}[{label}]{class}"));
        }

        for task in &self.workflow.tasks {
            let node_id = sanitize_id(&task.id);
            for dep in task.dependencies() {
                lines.push(format!("    {} --> {node_id}", sanitize_id(dep)));
            }
        }

        lines.push(String::new());
        lines.push("    classDef completed fill:#90EE90,stroke:#006400,stroke-width:2px".to_string());
        lines.push("    classDef failed fill:#FFB6C1,stroke:#8B0000,stroke-width:2px".to_string());
        lines.push("    classDef running fill:#87CEEB,stroke:#00008B,stroke-width:2px".to_string());
        lines.push("    classDef pending fill:#F0E68C,stroke:#8B8B00,stroke-width:2px".to_string());
        lines.push("```".to_string());

        lines.join("\n")
    }

    fn render_graphviz(&self, include_metrics: bool) -> String {
        let mut lines = vec![
            "digraph Workflow {".to_string(),
            "    rankdir=TB;".to_string(),
            "    node [shape=box, style=rounded];".to_string(),
            String::new(),
        ];

        for task in &self.workflow.tasks {
            let node_id = sanitize_id(&task.id);
            let mut label = task.id.clone();
            if include_metrics {
                if let Some(duration) = self.duration_of(&task.id) {
                    label = format!("{}\\n{duration:.1}s", task.id);
                }
            }
            let (color, fillcolor) = match self.status_of(&task.id) {
                Some(TaskStatus::Completed) => ("darkgreen", "lightgreen"),
                Some(TaskStatus::Failed) => ("darkred", "lightpink"),
                Some(TaskStatus::Running) => ("darkblue", "lightblue"),
                Some(_) => ("goldenrod", "lightyellow"),
                None => ("black", "white"),
            };
            lines.push(format!(
                "    {node_id} [label=\"{label}\", color=\"{color}\", \
                 fillcolor=\"{fillcolor}\", style=\"filled,rounded\"];"
            ));
        }

        lines.push(String::new());
        for task in &self.workflow.tasks {
            let node_id = sanitize_id(&task.id);
            for dep in task.dependencies() {
                lines.push(format!("    {} -> {node_id};", sanitize_id(dep)));
            }
        }
        lines.push("}".to_string());

        lines.join("\n")
    }

    fn render_ascii(&self, include_metrics: bool) -> String {
        let mut lines = vec![
            format!("Workflow: {}", self.workflow.name),
            format!("Strategy: {}", self.workflow.execution_strategy),
            "=".repeat(70),
            String::new(),
        ];

        for (level, task_ids) in self.task_levels().iter().enumerate() {
            if level > 0 {
                lines.push("    ↓".to_string());
            }
            lines.push(format!("Level {level}:"));
            for task_id in task_ids {
                let symbol = match self.status_of(task_id) {
                    Some(TaskStatus::Completed) => "✓",
                    Some(TaskStatus::Failed) => "✗",
                    Some(TaskStatus::Running) => "⟳",
                    _ => "○",
                };
                let mut line = format!("  {symbol} {task_id}");
                if include_metrics {
                    if let Some(duration) = self.duration_of(task_id) {
                        line.push_str(&format!(" ({duration:.1}s)"));
                    }
                }
                if let Some(task) = self.workflow.task(task_id) {
                    let deps: Vec<&str> = task.dependencies().collect();
                    if !deps.is_empty() {
                        line.push_str(&format!(" [depends: {}]", deps.join(", ")));
                    }
                }
                lines.push(line);
            }
        }

        lines.push(String::new());
        lines.push("Legend:".to_string());
        lines.push("  ✓ Completed".to_string());
        lines.push("  ✗ Failed".to_string());
        lines.push("  ⟳ Running".to_string());
        lines.push("  ○ Pending".to_string());

        lines.join("\n")
    }

    fn render_json(&self, include_metrics: bool) -> String {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        for task in &self.workflow.tasks {
            let mut node = serde_json::json!({
                "id": task.id,
                "description": task.description,
                "capabilities": task
                    .required_capabilities
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>(),
                "skills": task.required_skills,
                "priority": task.priority,
            });
            if let Some(status) = self.status_of(&task.id) {
                node["status"] = serde_json::json!(status);
            }
            if include_metrics {
                if let Some(result) =
                    self.state.and_then(|s| s.task_results.get(&task.id))
                {
                    node["metrics"] = serde_json::json!({
                        "duration_seconds": result.duration_seconds,
                        "retry_count": result.retry_count,
                        "agent_used": result.agent_used,
                    });
                    if let Some(error) = &result.error {
                        node["error"] = serde_json::json!(error);
                    }
                }
            }
            nodes.push(node);

            for dep in task.dependencies() {
                edges.push(serde_json::json!({"from": dep, "to": task.id}));
            }
        }

        let mut workflow = serde_json::json!({
            "id": self.workflow.id,
            "name": self.workflow.name,
            "strategy": self.workflow.execution_strategy,
        });
        if let Some(state) = self.state {
            workflow["status"] = serde_json::json!(state.status);
            if let Some(started_at) = state.started_at {
                workflow["started_at"] = serde_json::json!(started_at.to_rfc3339());
            }
            if let Some(completed_at) = state.completed_at {
                workflow["completed_at"] = serde_json::json!(completed_at.to_rfc3339());
            }
        }

        let data = serde_json::json!({
            "workflow": workflow,
            "nodes": nodes,
            "edges": edges,
        });
        serde_json::to_string_pretty(&data).unwrap_or_default()
    }

    fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.state.map(|state| state.task_status(task_id))
    }

    fn duration_of(&self, task_id: &str) -> Option<f64> {
        self.state
            .and_then(|state| state.task_results.get(task_id))
            .and_then(|result| result.duration_seconds)
    }

    /// Group task ids into topological levels (Kahn-style layering); on a
    /// cyclic graph the unplaceable remainder lands in one final level
    fn task_levels(&self) -> Vec<Vec<String>> {
        let deps: HashMap<&str, HashSet<&str>> = self
            .workflow
            .tasks
            .iter()
            .map(|task| (task.id.as_str(), task.dependencies().collect()))
            .collect();
        let all_tasks: Vec<&str> = self.workflow.tasks.iter().map(|t| t.id.as_str()).collect();

        let mut levels: Vec<Vec<String>> = Vec::new();
        let mut assigned: HashSet<&str> = HashSet::new();

        while assigned.len() < all_tasks.len() {
            let mut current: Vec<&str> = all_tasks
                .iter()
                .filter(|id| !assigned.contains(*id))
                .filter(|id| {
                    deps.get(*id)
                        .map(|d| {
                            d.iter()
                                .all(|dep| assigned.contains(dep) || !deps.contains_key(dep))
                        })
                        .unwrap_or(true)
                })
                .copied()
                .collect();

            if current.is_empty() {
                let remaining: Vec<String> = all_tasks
                    .iter()
                    .filter(|id| !assigned.contains(*id))
                    .map(|id| id.to_string())
                    .collect();
                levels.push(remaining);
                break;
            }

            current.sort_unstable();
            assigned.extend(current.iter().copied());
            levels.push(current.into_iter().map(str::to_string).collect());
        }

        levels
    }
}

/// Render a workflow in one call
pub fn visualize_workflow(
    workflow: &WorkflowDefinition,
    state: Option<&WorkflowState>,
    format: VisualizationFormat,
    include_metrics: bool,
) -> String {
    match state {
        Some(state) => WorkflowVisualizer::with_state(workflow, state).render(format, include_metrics),
        None => WorkflowVisualizer::new(workflow).render(format, include_metrics),
    }
}

fn sanitize_id(task_id: &str) -> String {
    task_id.replace(|c: char| c == '-' || c == '.' || c == ' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use workflow_core::models::{TaskDefinition, TaskResult};

    fn diamond() -> WorkflowDefinition {
        let a = TaskDefinition::new("a", "root");
        let mut b = TaskDefinition::new("b", "left");
        b.depends_on = vec!["a".to_string()];
        let mut c = TaskDefinition::new("c", "right");
        c.depends_on = vec!["a".to_string()];
        let mut d = TaskDefinition::new("d", "join");
        d.depends_on = vec!["b".to_string(), "c".to_string()];
        WorkflowDefinition::new("wf", "diamond", vec![a, b, c, d])
    }

    fn state_with_results(workflow: &WorkflowDefinition) -> WorkflowState {
        let mut state = WorkflowState::new(workflow);
        let now = Utc::now();

        let mut done = TaskResult::running("a", now);
        done.status = TaskStatus::Completed;
        done.completed_at = Some(now);
        done.duration_seconds = Some(1.5);
        state.task_results.insert("a".to_string(), done);
        state.completed_tasks.push("a".to_string());
        state.pending_tasks.retain(|id| id != "a");

        let mut failed = TaskResult::running("b", now);
        failed.status = TaskStatus::Failed;
        failed.error = Some("boom".to_string());
        failed.completed_at = Some(now);
        state.task_results.insert("b".to_string(), failed);
        state.failed_tasks.push("b".to_string());
        state.pending_tasks.retain(|id| id != "b");

        state
    }

    #[test]
    fn test_mermaid_structure() {
        let workflow = diamond();
        let output = WorkflowVisualizer::new(&workflow).render(VisualizationFormat::Mermaid, false);
        assert!(output.starts_with("```mermaid\ngraph TD"));
        assert!(output.contains("    a[a]"));
        assert!(output.contains("    a --> b"));
        assert!(output.contains("    b --> d"));
        assert!(output.contains("classDef completed"));
        assert!(output.ends_with("```"));
    }

    #[test]
    fn test_mermaid_status_classes() {
        let workflow = diamond();
        let state = state_with_results(&workflow);
        let output =
            WorkflowVisualizer::with_state(&workflow, &state).render(VisualizationFormat::Mermaid, true);
        assert!(output.contains("a[a<br/>1.5s]:::completed"));
        assert!(output.contains("b[b]:::failed"));
        assert!(output.contains("c[c]:::pending"));
    }

    #[test]
    fn test_graphviz_structure() {
        let workflow = diamond();
        let state = state_with_results(&workflow);
        let output = WorkflowVisualizer::with_state(&workflow, &state)
            .render(VisualizationFormat::Graphviz, false);
        assert!(output.starts_with("digraph Workflow {"));
        assert!(output.contains("rankdir=TB;"));
        assert!(output.contains("color=\"darkgreen\""));
        assert!(output.contains("color=\"darkred\""));
        assert!(output.contains("    a -> b;"));
        assert!(output.ends_with("}"));
    }

    #[test]
    fn test_ascii_levels_and_legend() {
        let workflow = diamond();
        let state = state_with_results(&workflow);
        let output =
            WorkflowVisualizer::with_state(&workflow, &state).render(VisualizationFormat::Ascii, true);
        assert!(output.contains("Workflow: diamond"));
        assert!(output.contains("Level 0:"));
        assert!(output.contains("  ✓ a (1.5s)"));
        assert!(output.contains("Level 1:"));
        assert!(output.contains("  ✗ b [depends: a]"));
        assert!(output.contains("Level 2:"));
        assert!(output.contains("  ○ d [depends: b, c]"));
        assert!(output.contains("Legend:"));
    }

    #[test]
    fn test_json_nodes_and_edges() {
        let workflow = diamond();
        let state = state_with_results(&workflow);
        let output =
            WorkflowVisualizer::with_state(&workflow, &state).render(VisualizationFormat::Json, true);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["workflow"]["id"], "wf");
        assert_eq!(parsed["workflow"]["strategy"], "dag");
        assert_eq!(parsed["nodes"].as_array().unwrap().len(), 4);
        assert_eq!(parsed["edges"].as_array().unwrap().len(), 4);

        let node_a = parsed["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["id"] == "a")
            .unwrap();
        assert_eq!(node_a["status"], "completed");
        assert_eq!(node_a["metrics"]["duration_seconds"], 1.5);

        let node_b = parsed["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["id"] == "b")
            .unwrap();
        assert_eq!(node_b["error"], "boom");
    }

    #[test]
    fn test_sanitized_ids() {
        let mut task = TaskDefinition::new("load data.v2", "load");
        task.depends_on = vec![];
        let mut consumer = TaskDefinition::new("post-process", "process");
        consumer.depends_on = vec!["load data.v2".to_string()];
        let workflow = WorkflowDefinition::new("wf", "sanitize", vec![task, consumer]);

        let output = WorkflowVisualizer::new(&workflow).render(VisualizationFormat::Mermaid, false);
        assert!(output.contains("load_data_v2[load data.v2]"));
        assert!(output.contains("load_data_v2 --> post_process"));
    }

    #[test]
    fn test_levels_with_cycle_terminate() {
        let mut a = TaskDefinition::new("a", "first");
        a.depends_on = vec!["b".to_string()];
        let mut b = TaskDefinition::new("b", "second");
        b.depends_on = vec!["a".to_string()];
        let workflow = WorkflowDefinition::new("wf", "cyclic", vec![a, b]);

        // must not loop forever; the cycle lands in one level
        let output = WorkflowVisualizer::new(&workflow).render(VisualizationFormat::Ascii, false);
        assert!(output.contains("Level 0:"));
    }
}
