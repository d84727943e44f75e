//! Memo Cache
//!
//! Each node owns a cache of memoized computations keyed by name.
//!
//! # How the Cache Works
//!
//! 1. `get_or_compute(key, deps, f)` looks up the entry for `key`.
//!
//! 2. If there is an entry and its dependency snapshot matches `deps`, the
//!    cached value is returned and `f` is not called.
//!
//! 3. Otherwise `f` runs, and its result replaces the entry together with a
//!    new snapshot.
//!
//! Dependencies compare with the usual rule: primitives by value, composites
//! by identity. Passing a freshly built record as a dependency therefore
//! recomputes every time.
//!
//! The cache never evicts. Entries live as long as the owning node, which
//! is why memoization is a performance hint, not something to rely on for
//! correctness.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;

use super::value::{DepValue, DependencySnapshot};

/// A cached value plus the dependencies it was computed from.
pub struct MemoEntry {
    value: Arc<dyn Any + Send + Sync>,
    snapshot: DependencySnapshot,
    computed_at: u64,
}

impl MemoEntry {
    /// Pass number in which the value was computed.
    pub fn computed_at(&self) -> u64 {
        self.computed_at
    }

    pub fn snapshot(&self) -> &DependencySnapshot {
        &self.snapshot
    }
}

impl std::fmt::Debug for MemoEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoEntry")
            .field("snapshot", &self.snapshot)
            .field("computed_at", &self.computed_at)
            .finish()
    }
}

/// Hit and miss counters for a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: usize,
    pub misses: usize,
}

/// Per-node memo cache.
#[derive(Debug, Default)]
pub struct MemoCache {
    entries: IndexMap<String, MemoEntry>,
    stats: MemoStats,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` while `deps` are unchanged,
    /// otherwise call `compute` and cache its result.
    ///
    /// Within one pass, repeated calls with equal `deps` compute once;
    /// calls with different `deps` recompute each time and keep the latest.
    /// A cached value of a different type counts as a miss.
    pub fn get_or_compute<T, F>(&mut self, key: &str, deps: &[DepValue], pass: u64, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(entry) = self.entries.get(key) {
            if entry.snapshot.matches(deps) {
                if let Some(value) = entry.value.downcast_ref::<T>() {
                    self.stats.hits += 1;
                    tracing::trace!(key, pass, "memo hit");
                    return value.clone();
                }
                tracing::debug!(key, "memo entry holds another type, recomputing");
            }
        }

        self.stats.misses += 1;
        tracing::trace!(key, pass, "memo miss");

        let value = compute();
        self.entries.insert(
            key.to_string(),
            MemoEntry {
                value: Arc::new(value.clone()),
                snapshot: DependencySnapshot::new(deps.iter().cloned()),
                computed_at: pass,
            },
        );
        value
    }

    pub fn entry(&self, key: &str) -> Option<&MemoEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> MemoStats {
        self.stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
