//! Property tests for cache key determinism.

use std::collections::HashMap;

use proptest::prelude::*;

use result_cache::CacheKey;
use workflow_core::models::{TaskDefinition, TaskResult, TaskStatus};

fn completed_result(task_id: &str, output: &str) -> TaskResult {
    let mut result = TaskResult::running(task_id, chrono::Utc::now());
    result.status = TaskStatus::Completed;
    result.output = Some(output.to_string());
    result
}

proptest! {
    /// Inserting the same parameter map in any order yields the same key.
    #[test]
    fn key_ignores_parameter_insertion_order(
        mut params in proptest::collection::vec(("[a-z]{1,8}", 0i64..1000), 0..8)
    ) {
        params.sort();
        params.dedup_by(|a, b| a.0 == b.0);

        let mut forward = TaskDefinition::new("task", "do the thing");
        for (key, value) in &params {
            forward.parameters.insert(key.clone(), serde_json::json!(value));
        }

        let mut reversed = TaskDefinition::new("task", "do the thing");
        for (key, value) in params.iter().rev() {
            reversed.parameters.insert(key.clone(), serde_json::json!(value));
        }

        prop_assert_eq!(
            CacheKey::generate(&forward, None, true),
            CacheKey::generate(&reversed, None, true)
        );
    }

    /// Regenerating a key from the same definition and dependency map is
    /// stable.
    #[test]
    fn key_roundtrip_is_stable(output in "[ -~]{0,40}") {
        let mut task = TaskDefinition::new("consumer", "consume upstream output");
        task.depends_on = vec!["producer".to_string()];

        let mut deps = HashMap::new();
        deps.insert("producer".to_string(), completed_result("producer", &output));

        let first = CacheKey::generate(&task, Some(&deps), true);
        let second = CacheKey::generate(&task, Some(&deps), true);
        prop_assert_eq!(first, second);
    }
}
