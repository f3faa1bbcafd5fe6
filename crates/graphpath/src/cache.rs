//! Process-wide cache of compiled expressions.
//!
//! Entries are held weakly: an expression stays cached while any caller
//! still holds it, or while it is among the `capacity` most recently used
//! ones. Keys whose expression was dropped count as misses and are swept
//! out every `cleanup_threshold` misses.
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock, Mutex, PoisonError, Weak};

use lru::LruCache;

use crate::compiler::{self, CompiledExpression};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Number of recently used expressions kept alive; `0` keeps only
    /// those held elsewhere.
    pub capacity: usize,
    /// Misses between two sweeps of dropped entries.
    pub cleanup_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { capacity: 256, cleanup_threshold: 500 }
    }
}

struct CacheState {
    entries: HashMap<String, Weak<CompiledExpression>>,
    retained: Option<LruCache<String, Arc<CompiledExpression>>>,
    misses: usize,
}

pub struct ExpressionCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let retained = NonZeroUsize::new(config.capacity).map(LruCache::new);
        ExpressionCache {
            config,
            state: Mutex::new(CacheState { entries: HashMap::new(), retained, misses: 0 }),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// The compiled form of `query`, compiling it on a miss.
    ///
    /// Compilation runs without holding the lock; two threads missing on
    /// the same text may both compile it and the later insert wins.
    pub fn compile(&self, query: &str) -> Result<Arc<CompiledExpression>> {
        {
            let mut state = self.lock();
            let live = state.entries.get(query).and_then(Weak::upgrade);
            if let Some(compiled) = live {
                if let Some(retained) = state.retained.as_mut() {
                    retained.put(query.to_string(), Arc::clone(&compiled));
                }
                tracing::trace!(query, "expression cache hit");
                return Ok(compiled);
            }
        }

        tracing::trace!(query, "expression cache miss");
        let compiled = Arc::new(compiler::compile(query)?);

        let mut state = self.lock();
        state.misses = state.misses.wrapping_add(1);
        if state.misses >= self.config.cleanup_threshold {
            let before = state.entries.len();
            state.entries.retain(|_, entry| entry.strong_count() > 0);
            tracing::debug!(swept = before - state.entries.len(), "swept expression cache");
            state.misses = 0;
        }
        state.entries.insert(query.to_string(), Arc::downgrade(&compiled));
        if let Some(retained) = state.retained.as_mut() {
            retained.put(query.to_string(), Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    /// Number of keys, including ones whose expression was dropped but not
    /// yet swept.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys whose expression is still alive.
    pub fn live_len(&self) -> usize {
        self.lock().entries.values().filter(|entry| entry.strong_count() > 0).count()
    }

    /// Misses since the last sweep.
    pub fn misses(&self) -> usize {
        self.lock().misses
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        if let Some(retained) = state.retained.as_mut() {
            retained.clear();
        }
        state.misses = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

static GLOBAL: LazyLock<Arc<ExpressionCache>> = LazyLock::new(|| Arc::new(ExpressionCache::new()));

/// The process-wide cache contexts use unless given their own.
pub fn global() -> Arc<ExpressionCache> {
    Arc::clone(&GLOBAL)
}

/// Compile through the process-wide cache.
pub fn compile(query: &str) -> Result<Arc<CompiledExpression>> {
    GLOBAL.compile(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retained_entries_survive_dropping_the_handle() {
        let cache = ExpressionCache::with_config(CacheConfig { capacity: 1, cleanup_threshold: 10 });
        let first = cache.compile("a/b").expect("compile");
        drop(first);
        assert_eq!(cache.live_len(), 1);
        cache.compile("c").expect("compile");
        // "a/b" was evicted from the retained set by "c"
        assert_eq!(cache.live_len(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn compile_errors_are_not_cached() {
        let cache = ExpressionCache::new();
        assert!(cache.compile("a[").is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.misses(), 0);
    }
}
