use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use workflow_core::models::{TaskDefinition, TaskResult};

use crate::key::CacheKey;
use crate::{CacheConfig, CacheStrategy};

/// Version tag written into every disk entry; entries with a different tag
/// are treated as misses so the format can evolve
const DISK_FORMAT_VERSION: u32 = 1;

/// Content-addressed result cache with memory, disk, and hybrid tiers.
///
/// Sits between the per-task driver and the agent substrate: the driver asks
/// for a cached result before invoking the agent and stores the result after
/// a successful call. Retries and failures never populate the cache.
///
/// The memory tier is LRU-bounded at `max_size` entries; the disk tier keeps
/// one JSON file per key under the configured directory with the file mtime
/// as the TTL reference. Disk failures of any kind are logged, counted as
/// misses, and never surfaced; the cache must not break a run.
pub struct ResultCache {
    config: CacheConfig,
    disk_dir: Option<PathBuf>,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    invalidations: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    task_id: String,
    result: TaskResult,
    created_at: DateTime<Utc>,
    accessed_at: DateTime<Utc>,
    access_count: u64,
    dependency_ids: Vec<String>,
}

/// Self-describing on-disk form of a cached result
#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    format_version: u32,
    task_id: String,
    dependency_ids: Vec<String>,
    result: TaskResult,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    pub strategy: CacheStrategy,
    pub hits: u64,
    pub misses: u64,
    /// Hits as a percentage of all lookups, formatted like "66.7%"
    pub hit_rate: String,
    pub evictions: u64,
    pub invalidations: u64,
    /// Current number of memory entries
    pub size: usize,
    pub max_size: usize,
}

impl ResultCache {
    /// Create a cache; for disk-backed strategies the cache directory is
    /// created eagerly (failures are logged and degrade to misses)
    pub fn new(config: CacheConfig) -> Self {
        let disk_dir = if config.strategy.uses_disk() {
            let dir = config
                .cache_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("workflow-result-cache"));
            if let Err(err) = std::fs::create_dir_all(&dir) {
                tracing::debug!(dir = %dir.display(), error = %err, "cache directory unavailable");
            }
            Some(dir)
        } else {
            None
        };
        Self {
            config,
            disk_dir,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Create a disabled cache
    pub fn disabled() -> Self {
        Self::new(CacheConfig {
            strategy: CacheStrategy::None,
            ..CacheConfig::default()
        })
    }

    /// The configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached result for a task.
    ///
    /// Checks the memory tier first, then the disk tier; a hybrid cache
    /// promotes disk hits into memory. Expired entries read as absent.
    pub fn get(
        &self,
        task: &TaskDefinition,
        dependency_results: Option<&HashMap<String, TaskResult>>,
    ) -> Option<TaskResult> {
        if self.config.strategy == CacheStrategy::None {
            return None;
        }
        let key = CacheKey::generate(task, dependency_results, self.config.include_dependencies);

        if self.config.strategy.uses_memory() {
            let mut inner = self.inner.lock();
            let valid = match inner.entries.get(&key) {
                Some(entry) => self.is_fresh(entry),
                None => false,
            };
            if valid {
                if let Some(entry) = inner.entries.get_mut(&key) {
                    entry.accessed_at = Utc::now();
                    entry.access_count += 1;
                    let result = entry.result.clone();
                    inner.hits += 1;
                    tracing::debug!(task_id = %task.id, "cache hit (memory)");
                    return Some(result);
                }
            }
        }

        if self.config.strategy.uses_disk() {
            if let Some(entry) = self.load_from_disk(&key) {
                let mut inner = self.inner.lock();
                inner.hits += 1;
                let result = entry.result.clone();
                if self.config.strategy == CacheStrategy::Hybrid {
                    self.store_in_memory(
                        &mut inner,
                        key,
                        entry.task_id,
                        entry.result,
                        entry.dependency_ids,
                    );
                }
                tracing::debug!(task_id = %task.id, "cache hit (disk)");
                return Some(result);
            }
        }

        self.inner.lock().misses += 1;
        None
    }

    /// Store a successful task result.
    ///
    /// `dependency_results` must be the same map the key was generated from
    /// on lookup so that reruns address the same entry.
    pub fn put(
        &self,
        task: &TaskDefinition,
        result: &TaskResult,
        dependency_results: Option<&HashMap<String, TaskResult>>,
    ) {
        if self.config.strategy == CacheStrategy::None {
            return;
        }
        let key = CacheKey::generate(task, dependency_results, self.config.include_dependencies);

        let dependency_ids: Vec<String> = match (self.config.include_dependencies, dependency_results)
        {
            (true, Some(results)) => task
                .dependencies()
                .filter(|dep| results.contains_key(*dep))
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        if self.config.strategy.uses_memory() {
            let mut inner = self.inner.lock();
            self.store_in_memory(
                &mut inner,
                key.clone(),
                task.id.clone(),
                result.clone(),
                dependency_ids.clone(),
            );
        }

        if self.config.strategy.uses_disk() {
            self.save_to_disk(&key, task, result, dependency_ids);
        }
    }

    /// Remove every entry that belongs to `task_id` or lists it as a
    /// dependency, plus any disk file whose name contains the id.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, task_id: &str) -> usize {
        let mut count = {
            let mut inner = self.inner.lock();
            let keys: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| {
                    entry.task_id == task_id
                        || entry.dependency_ids.iter().any(|dep| dep == task_id)
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                inner.entries.remove(key);
            }
            keys.len()
        };

        if let Some(dir) = &self.disk_dir {
            count += remove_matching_files(dir, |name| name.contains(task_id));
        }

        self.inner.lock().invalidations += count as u64;
        count
    }

    /// Remove memory entries that list `task_id` as one of their
    /// dependencies; returns the number removed
    pub fn invalidate_dependents(&self, task_id: &str) -> usize {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.dependency_ids.iter().any(|dep| dep == task_id))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            inner.entries.remove(key);
        }
        inner.invalidations += keys.len() as u64;
        keys.len()
    }

    /// Drop both tiers and reset all counters
    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock();
            *inner = CacheInner::default();
        }
        if let Some(dir) = &self.disk_dir {
            remove_matching_files(dir, |_| true);
        }
    }

    /// Current counters and sizes
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;
        let hit_rate = if lookups > 0 {
            format!("{:.1}%", inner.hits as f64 / lookups as f64 * 100.0)
        } else {
            "0.0%".to_string()
        };
        CacheStats {
            strategy: self.config.strategy,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
            evictions: inner.evictions,
            invalidations: inner.invalidations,
            size: inner.entries.len(),
            max_size: self.config.max_size,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match self.config.ttl_seconds {
            None => true,
            Some(ttl) => {
                let age = (Utc::now() - entry.created_at)
                    .to_std()
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                age < ttl
            }
        }
    }

    fn store_in_memory(
        &self,
        inner: &mut CacheInner,
        key: String,
        task_id: String,
        result: TaskResult,
        dependency_ids: Vec<String>,
    ) {
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_size {
            evict_lru(inner);
        }
        let now = Utc::now();
        inner.entries.insert(
            key,
            CacheEntry {
                task_id,
                result,
                created_at: now,
                accessed_at: now,
                access_count: 0,
                dependency_ids,
            },
        );
    }

    fn save_to_disk(
        &self,
        key: &str,
        task: &TaskDefinition,
        result: &TaskResult,
        dependency_ids: Vec<String>,
    ) {
        let Some(dir) = &self.disk_dir else { return };
        let entry = DiskEntry {
            format_version: DISK_FORMAT_VERSION,
            task_id: task.id.clone(),
            dependency_ids,
            result: result.clone(),
        };
        let path = dir.join(format!("{key}.cache"));
        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(task_id = %task.id, error = %err, "cache entry not serializable");
                return;
            }
        };
        if let Err(err) = std::fs::write(&path, bytes) {
            tracing::debug!(path = %path.display(), error = %err, "cache write failed");
        }
    }

    fn load_from_disk(&self, key: &str) -> Option<DiskEntry> {
        let dir = self.disk_dir.as_ref()?;
        let path = dir.join(format!("{key}.cache"));
        if !path.exists() {
            return None;
        }

        if let Some(ttl) = self.config.ttl_seconds {
            let age = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| mtime.elapsed().ok())
                .map(|elapsed| elapsed.as_secs_f64());
            if age.map(|age| age >= ttl).unwrap_or(true) {
                let _ = std::fs::remove_file(&path);
                return None;
            }
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cache read failed");
                return None;
            }
        };
        match serde_json::from_slice::<DiskEntry>(&bytes) {
            Ok(entry) if entry.format_version == DISK_FORMAT_VERSION => Some(entry),
            Ok(entry) => {
                tracing::debug!(
                    path = %path.display(),
                    version = entry.format_version,
                    "cache entry has unknown format version"
                );
                None
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cache entry undecodable");
                None
            }
        }
    }
}

fn evict_lru(inner: &mut CacheInner) {
    let lru_key = inner
        .entries
        .iter()
        .min_by_key(|(_, entry)| entry.accessed_at)
        .map(|(key, _)| key.clone());
    if let Some(key) = lru_key {
        inner.entries.remove(&key);
        inner.evictions += 1;
    }
}

fn remove_matching_files(dir: &Path, matches: impl Fn(&str) -> bool) -> usize {
    let mut removed = 0;
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(".cache") && matches(name) && std::fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_core::models::TaskStatus;

    fn completed_result(task_id: &str, output: &str) -> TaskResult {
        let mut result = TaskResult::running(task_id, Utc::now());
        result.status = TaskStatus::Completed;
        result.output = Some(output.to_string());
        result
    }

    fn memory_cache(max_size: usize) -> ResultCache {
        ResultCache::new(CacheConfig {
            strategy: CacheStrategy::Memory,
            max_size,
            ..CacheConfig::default()
        })
    }

    #[test]
    fn test_memory_roundtrip() {
        let cache = memory_cache(10);
        let task = TaskDefinition::new("a", "analyze");

        assert!(cache.get(&task, None).is_none());
        cache.put(&task, &completed_result("a", "out"), None);

        let hit = cache.get(&task, None).unwrap();
        assert_eq!(hit.output.as_deref(), Some("out"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, "50.0%");
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_disabled_strategy_never_stores() {
        let cache = ResultCache::disabled();
        let task = TaskDefinition::new("a", "analyze");
        cache.put(&task, &completed_result("a", "out"), None);
        assert!(cache.get(&task, None).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_expired_entries_read_as_absent() {
        let cache = ResultCache::new(CacheConfig {
            strategy: CacheStrategy::Memory,
            ttl_seconds: Some(0.0),
            ..CacheConfig::default()
        });
        let task = TaskDefinition::new("a", "analyze");
        cache.put(&task, &completed_result("a", "out"), None);
        assert!(cache.get(&task, None).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_long_ttl_entries_stay_fresh() {
        let cache = ResultCache::new(CacheConfig {
            strategy: CacheStrategy::Memory,
            ttl_seconds: Some(3600.0),
            ..CacheConfig::default()
        });
        let task = TaskDefinition::new("a", "analyze");
        cache.put(&task, &completed_result("a", "out"), None);
        assert!(cache.get(&task, None).is_some());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = memory_cache(2);
        let first = TaskDefinition::new("first", "task");
        let second = TaskDefinition::new("second", "task");
        let third = TaskDefinition::new("third", "task");

        cache.put(&first, &completed_result("first", "1"), None);
        cache.put(&second, &completed_result("second", "2"), None);

        // freshen "first" so "second" becomes the LRU entry
        assert!(cache.get(&first, None).is_some());
        cache.put(&third, &completed_result("third", "3"), None);

        assert!(cache.get(&first, None).is_some());
        assert!(cache.get(&second, None).is_none());
        assert!(cache.get(&third, None).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reinserting_existing_key_does_not_evict() {
        let cache = memory_cache(1);
        let task = TaskDefinition::new("a", "task");
        cache.put(&task, &completed_result("a", "1"), None);
        cache.put(&task, &completed_result("a", "2"), None);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(
            cache.get(&task, None).unwrap().output.as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_invalidate_removes_own_and_dependent_entries() {
        let cache = memory_cache(10);
        let a = TaskDefinition::new("a", "produce");
        let mut b = TaskDefinition::new("b", "consume");
        b.depends_on = vec!["a".to_string()];

        cache.put(&a, &completed_result("a", "out-a"), None);
        let mut deps = HashMap::new();
        deps.insert("a".to_string(), completed_result("a", "out-a"));
        cache.put(&b, &completed_result("b", "out-b"), Some(&deps));

        let removed = cache.invalidate("a");
        assert_eq!(removed, 2);
        assert!(cache.get(&a, None).is_none());
        assert!(cache.get(&b, Some(&deps)).is_none());
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[test]
    fn test_invalidate_dependents_leaves_the_task_itself() {
        let cache = memory_cache(10);
        let a = TaskDefinition::new("a", "produce");
        let mut b = TaskDefinition::new("b", "consume");
        b.depends_on = vec!["a".to_string()];

        cache.put(&a, &completed_result("a", "out-a"), None);
        let mut deps = HashMap::new();
        deps.insert("a".to_string(), completed_result("a", "out-a"));
        cache.put(&b, &completed_result("b", "out-b"), Some(&deps));

        let removed = cache.invalidate_dependents("a");
        assert_eq!(removed, 1);
        assert!(cache.get(&a, None).is_some());
        assert!(cache.get(&b, Some(&deps)).is_none());
    }

    #[test]
    fn test_clear_resets_everything() {
        let cache = memory_cache(10);
        let task = TaskDefinition::new("a", "task");
        cache.put(&task, &completed_result("a", "out"), None);
        cache.get(&task, None);
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 0);
        assert!(cache.get(&task, None).is_none());
    }

    #[test]
    fn test_disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            strategy: CacheStrategy::Disk,
            cache_dir: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let task = TaskDefinition::new("a", "analyze");

        let cache = ResultCache::new(config.clone());
        cache.put(&task, &completed_result("a", "persisted"), None);
        drop(cache);

        // a fresh cache over the same directory sees the entry
        let cache = ResultCache::new(config);
        let hit = cache.get(&task, None).unwrap();
        assert_eq!(hit.output.as_deref(), Some("persisted"));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_corrupted_disk_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            strategy: CacheStrategy::Disk,
            cache_dir: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let task = TaskDefinition::new("a", "analyze");

        let cache = ResultCache::new(config);
        cache.put(&task, &completed_result("a", "ok"), None);

        // corrupt the single entry on disk
        for entry in std::fs::read_dir(dir.path()).unwrap().flatten() {
            std::fs::write(entry.path(), b"not json").unwrap();
        }

        assert!(cache.get(&task, None).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_hybrid_promotes_disk_hits_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            strategy: CacheStrategy::Hybrid,
            cache_dir: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let task = TaskDefinition::new("a", "analyze");

        // seed the disk tier with a separate cache instance
        ResultCache::new(config.clone()).put(&task, &completed_result("a", "out"), None);

        let cache = ResultCache::new(config);
        assert_eq!(cache.stats().size, 0);
        assert!(cache.get(&task, None).is_some());
        assert_eq!(cache.stats().size, 1);
    }
}
