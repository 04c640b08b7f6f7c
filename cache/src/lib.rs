//! Result Cache Library
//!
//! Content-addressed caching of task results for the workflow orchestration
//! system. Cache keys are SHA-256 digests over task identity and (optionally)
//! dependency outputs, so any upstream change produces a fresh key and a
//! cache miss.
//!
//! The cache never breaks a run: every disk-tier failure is logged, counted
//! as a miss, and swallowed.
//!
//! # Example
//!
//! ```rust
//! use result_cache::{CacheConfig, CacheStrategy, ResultCache};
//! use workflow_core::models::{TaskDefinition, TaskResult, TaskStatus};
//!
//! let cache = ResultCache::new(CacheConfig {
//!     strategy: CacheStrategy::Memory,
//!     ..CacheConfig::default()
//! });
//!
//! let task = TaskDefinition::new("analyze", "Analyze the corpus");
//! assert!(cache.get(&task, None).is_none());
//!
//! let mut result = TaskResult::running("analyze", chrono::Utc::now());
//! result.status = TaskStatus::Completed;
//! result.output = Some("42 documents".to_string());
//! cache.put(&task, &result, None);
//!
//! assert!(cache.get(&task, None).is_some());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod key;
pub mod store;

pub use key::CacheKey;
pub use store::{CacheStats, ResultCache};

/// Storage strategy for the result cache
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Caching disabled
    None,
    /// In-memory tier only, LRU-bounded
    Memory,
    /// One file per key in a directory
    Disk,
    /// Read-through disk into memory; writes go to both
    Hybrid,
}

impl CacheStrategy {
    pub(crate) fn uses_memory(&self) -> bool {
        matches!(self, CacheStrategy::Memory | CacheStrategy::Hybrid)
    }

    pub(crate) fn uses_disk(&self) -> bool {
        matches!(self, CacheStrategy::Disk | CacheStrategy::Hybrid)
    }
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CacheStrategy::None => "none",
            CacheStrategy::Memory => "memory",
            CacheStrategy::Disk => "disk",
            CacheStrategy::Hybrid => "hybrid",
        };
        write!(f, "{s}")
    }
}

/// Configuration for the result cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Storage strategy
    pub strategy: CacheStrategy,
    /// Entries older than this are treated as absent
    pub ttl_seconds: Option<f64>,
    /// Maximum number of memory entries before LRU eviction
    pub max_size: usize,
    /// Directory for the disk tier; a temp-dir default is used when unset
    pub cache_dir: Option<PathBuf>,
    /// Include dependency outputs in key computation
    pub include_dependencies: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::Memory,
            ttl_seconds: None,
            max_size: 1000,
            cache_dir: None,
            include_dependencies: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_tiers() {
        assert!(CacheStrategy::Memory.uses_memory());
        assert!(!CacheStrategy::Memory.uses_disk());
        assert!(CacheStrategy::Disk.uses_disk());
        assert!(!CacheStrategy::Disk.uses_memory());
        assert!(CacheStrategy::Hybrid.uses_memory());
        assert!(CacheStrategy::Hybrid.uses_disk());
        assert!(!CacheStrategy::None.uses_memory());
        assert!(!CacheStrategy::None.uses_disk());
    }

    #[test]
    fn test_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.strategy, CacheStrategy::Memory);
        assert_eq!(config.max_size, 1000);
        assert!(config.include_dependencies);
        assert!(config.ttl_seconds.is_none());
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(CacheStrategy::Hybrid.to_string(), "hybrid");
        assert_eq!(CacheStrategy::None.to_string(), "none");
    }
}
