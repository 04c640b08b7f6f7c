use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sha2::{Digest, Sha256};

use workflow_core::models::{TaskDefinition, TaskResult};

/// Cache key derivation for task results.
///
/// A key is the SHA-256 of a deterministic JSON serialization of the task's
/// identity (id, description, key-sorted parameters, capability and skill
/// string forms) and, when `include_dependencies` is set, a map from each
/// dependency id to the string form of its output. Any upstream output change
/// therefore produces a different key; with `include_dependencies` off,
/// dependency outputs are excluded from the computation entirely.
pub struct CacheKey;

#[derive(Serialize)]
struct KeyComponents<'a> {
    task_id: &'a str,
    description: &'a str,
    parameters: &'a BTreeMap<String, serde_json::Value>,
    required_capabilities: Vec<&'static str>,
    required_skills: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<BTreeMap<&'a str, &'a str>>,
}

impl CacheKey {
    /// Generate the hex-encoded cache key for a task
    pub fn generate(
        task: &TaskDefinition,
        dependency_results: Option<&HashMap<String, TaskResult>>,
        include_dependencies: bool,
    ) -> String {
        let dependencies = match (include_dependencies, dependency_results) {
            (true, Some(results)) => {
                let mut outputs = BTreeMap::new();
                for dep_id in task.dependencies() {
                    if let Some(result) = results.get(dep_id) {
                        outputs.insert(dep_id, result.output.as_deref().unwrap_or(""));
                    }
                }
                Some(outputs)
            }
            _ => None,
        };

        let components = KeyComponents {
            task_id: &task.id,
            description: &task.description,
            parameters: &task.parameters,
            required_capabilities: task
                .required_capabilities
                .iter()
                .map(|c| c.as_str())
                .collect(),
            required_skills: &task.required_skills,
            dependencies,
        };

        // BTreeMap fields keep the JSON deterministic regardless of the
        // order keys were inserted in.
        let serialized =
            serde_json::to_vec(&components).unwrap_or_else(|_| task.id.as_bytes().to_vec());
        let digest = Sha256::digest(&serialized);
        hex::encode(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_core::models::{AgentCapability, TaskStatus};

    fn completed_result(task_id: &str, output: &str) -> TaskResult {
        let mut result = TaskResult::running(task_id, chrono::Utc::now());
        result.status = TaskStatus::Completed;
        result.output = Some(output.to_string());
        result
    }

    #[test]
    fn test_key_is_deterministic() {
        let task = TaskDefinition::new("a", "analyze the input");
        let first = CacheKey::generate(&task, None, true);
        let second = CacheKey::generate(&task, None, true);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_parameter_insertion_order_is_irrelevant() {
        let mut forward = TaskDefinition::new("a", "task");
        forward
            .parameters
            .insert("alpha".to_string(), serde_json::json!(1));
        forward
            .parameters
            .insert("beta".to_string(), serde_json::json!("two"));

        let mut reversed = TaskDefinition::new("a", "task");
        reversed
            .parameters
            .insert("beta".to_string(), serde_json::json!("two"));
        reversed
            .parameters
            .insert("alpha".to_string(), serde_json::json!(1));

        assert_eq!(
            CacheKey::generate(&forward, None, true),
            CacheKey::generate(&reversed, None, true)
        );
    }

    #[test]
    fn test_identity_fields_change_the_key() {
        let base = TaskDefinition::new("a", "task");
        let base_key = CacheKey::generate(&base, None, true);

        let renamed = TaskDefinition::new("b", "task");
        assert_ne!(base_key, CacheKey::generate(&renamed, None, true));

        let mut described = base.clone();
        described.description = "different".to_string();
        assert_ne!(base_key, CacheKey::generate(&described, None, true));

        let mut skilled = base.clone();
        skilled.required_skills = vec!["search".to_string()];
        assert_ne!(base_key, CacheKey::generate(&skilled, None, true));

        let mut capable = base.clone();
        capable.required_capabilities = vec![AgentCapability::Research];
        assert_ne!(base_key, CacheKey::generate(&capable, None, true));
    }

    #[test]
    fn test_dependency_outputs_change_the_key() {
        let mut task = TaskDefinition::new("b", "summarize");
        task.depends_on = vec!["a".to_string()];

        let mut deps = HashMap::new();
        deps.insert("a".to_string(), completed_result("a", "output-1"));
        let first = CacheKey::generate(&task, Some(&deps), true);

        deps.insert("a".to_string(), completed_result("a", "output-2"));
        let second = CacheKey::generate(&task, Some(&deps), true);
        assert_ne!(first, second);
    }

    #[test]
    fn test_dependencies_excluded_when_disabled() {
        let mut task = TaskDefinition::new("b", "summarize");
        task.depends_on = vec!["a".to_string()];

        let mut deps = HashMap::new();
        deps.insert("a".to_string(), completed_result("a", "output-1"));
        let with_deps = CacheKey::generate(&task, Some(&deps), false);

        deps.insert("a".to_string(), completed_result("a", "output-2"));
        let changed_deps = CacheKey::generate(&task, Some(&deps), false);
        let no_deps = CacheKey::generate(&task, None, false);

        assert_eq!(with_deps, changed_deps);
        assert_eq!(with_deps, no_deps);
    }

    #[test]
    fn test_unrelated_results_do_not_affect_the_key() {
        let mut task = TaskDefinition::new("b", "summarize");
        task.depends_on = vec!["a".to_string()];

        let mut deps = HashMap::new();
        deps.insert("a".to_string(), completed_result("a", "output"));
        let baseline = CacheKey::generate(&task, Some(&deps), true);

        deps.insert("zzz".to_string(), completed_result("zzz", "noise"));
        assert_eq!(baseline, CacheKey::generate(&task, Some(&deps), true));
    }
}
