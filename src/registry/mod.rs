//! Chunk registry
//!
//! Arena-style map from chunk identity to loadable-unit state. Entries are
//! created on first registration and mutated only through registry handles;
//! the loader never holds an independent copy. No I/O happens here.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::error::LoadError;
use crate::route::{ChunkFactory, ChunkModule};

/// Terminal or in-progress result shared by every caller joined on a chunk
pub type LoadOutcome = Result<ChunkModule, LoadError>;

/// Load status of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Idle,
    Loading,
    Loaded,
    Error,
}

/// One loadable unit
pub(crate) struct ChunkEntry {
    pub(crate) factory: ChunkFactory,
    pub(crate) status: ChunkStatus,
    pub(crate) value: Option<ChunkModule>,
    pub(crate) last_error: Option<String>,
    pub(crate) size_estimate: Option<u64>,
    pub(crate) access_count: u64,
    pub(crate) registered_at: Instant,
    pub(crate) last_access: Instant,
    pub(crate) preloaded: bool,

    /// Shared in-flight outcome; present exactly while status is Loading
    pub(crate) in_flight: Option<watch::Receiver<Option<LoadOutcome>>>,
}

impl ChunkEntry {
    fn new(factory: ChunkFactory, size_estimate: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            factory,
            status: ChunkStatus::Idle,
            value: None,
            last_error: None,
            size_estimate,
            access_count: 0,
            registered_at: now,
            last_access: now,
            preloaded: false,
            in_flight: None,
        }
    }
}

/// Point-in-time view of a chunk entry
#[derive(Debug, Clone)]
pub struct ChunkSnapshot {
    pub status: ChunkStatus,
    pub access_count: u64,
    pub preloaded: bool,
    pub size_estimate: Option<u64>,
    pub last_error: Option<String>,
    pub registered_at: Instant,
    pub last_access: Instant,
}

/// Aggregate counters across all chunks
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkStats {
    pub total: usize,
    pub idle: usize,
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
    pub preloaded: usize,
    pub total_accesses: u64,
    pub estimated_bytes: u64,
}

/// The chunk arena
#[derive(Default)]
pub struct ChunkRegistry {
    entries: DashMap<String, ChunkEntry>,
}

impl ChunkRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chunk under a key. Idempotent: re-registration of an
    /// existing key is a no-op and returns false.
    pub fn register(
        &self,
        key: impl Into<String>,
        factory: ChunkFactory,
        size_estimate: Option<u64>,
    ) -> bool {
        let key = key.into();
        match self.entries.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!("Chunk '{}' already registered", key);
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ChunkEntry::new(factory, size_estimate));
                debug!("Registered chunk '{}'", key);
                true
            }
        }
    }

    /// Whether a key is registered
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered chunks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current status of a chunk
    pub fn status(&self, key: &str) -> Option<ChunkStatus> {
        self.entries.get(key).map(|e| e.status)
    }

    /// Point-in-time snapshot of a chunk
    pub fn snapshot(&self, key: &str) -> Option<ChunkSnapshot> {
        self.entries.get(key).map(|e| ChunkSnapshot {
            status: e.status,
            access_count: e.access_count,
            preloaded: e.preloaded,
            size_estimate: e.size_estimate,
            last_error: e.last_error.clone(),
            registered_at: e.registered_at,
            last_access: e.last_access,
        })
    }

    /// Increment the access counter and stamp the access time
    pub fn record_access(&self, key: &str) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.access_count += 1;
            entry.last_access = Instant::now();
        }
    }

    /// Remove entries older than `max_age` that were registered but never
    /// requested. Accessed entries are preserved, as are loaded and errored
    /// ones. Returns the number of entries removed.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            let stale = entry.last_access.elapsed() > max_age
                && entry.access_count == 0
                && !matches!(entry.status, ChunkStatus::Loaded | ChunkStatus::Error);
            !stale
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Evicted {} stale chunk(s)", evicted);
        }
        evicted
    }

    /// Aggregate counters across all entries
    pub fn stats(&self) -> ChunkStats {
        let mut stats = ChunkStats::default();
        for entry in self.entries.iter() {
            stats.total += 1;
            match entry.status {
                ChunkStatus::Idle => stats.idle += 1,
                ChunkStatus::Loading => stats.loading += 1,
                ChunkStatus::Loaded => stats.loaded += 1,
                ChunkStatus::Error => stats.failed += 1,
            }
            if entry.preloaded {
                stats.preloaded += 1;
            }
            stats.total_accesses += entry.access_count;
            stats.estimated_bytes += entry.size_estimate.unwrap_or(0);
        }
        stats
    }

    /// Run a closure against a mutable entry handle. The closure must not
    /// call back into the registry.
    pub(crate) fn with_entry<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut ChunkEntry) -> R,
    ) -> Option<R> {
        self.entries.get_mut(key).map(|mut entry| f(&mut entry))
    }

    /// Terminal success: cache the value and clear the in-flight handle
    pub(crate) fn finish_loaded(&self, key: &str, value: ChunkModule) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status = ChunkStatus::Loaded;
            entry.value = Some(value);
            entry.last_error = None;
            entry.preloaded = true;
            entry.in_flight = None;
        }
    }

    /// Terminal failure: record the last error and clear the in-flight handle
    pub(crate) fn finish_error(&self, key: &str, error: String) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status = ChunkStatus::Error;
            entry.last_error = Some(error);
            entry.in_flight = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn noop_factory() -> ChunkFactory {
        Arc::new(|| Box::pin(async { Ok(Arc::new(()) as ChunkModule) }))
    }

    #[test]
    fn test_register_idempotent() {
        let registry = ChunkRegistry::new();

        assert!(registry.register("products", noop_factory(), Some(2048)));
        assert!(!registry.register("products", noop_factory(), None));

        assert_eq!(registry.len(), 1);
        // the first registration wins
        assert_eq!(registry.snapshot("products").unwrap().size_estimate, Some(2048));
    }

    #[test]
    fn test_record_access_stamps_entry() {
        let registry = ChunkRegistry::new();
        registry.register("home", noop_factory(), None);

        let before = registry.snapshot("home").unwrap();
        assert_eq!(before.access_count, 0);

        registry.record_access("home");
        registry.record_access("home");

        let after = registry.snapshot("home").unwrap();
        assert_eq!(after.access_count, 2);
        assert!(after.last_access >= before.last_access);
    }

    #[test]
    fn test_evict_removes_only_unrequested() {
        let registry = ChunkRegistry::new();
        registry.register("never-used", noop_factory(), None);
        registry.register("accessed", noop_factory(), None);
        registry.register("loaded", noop_factory(), None);

        registry.record_access("accessed");
        registry.finish_loaded("loaded", Arc::new(()) as ChunkModule);

        // make every entry older than a zero threshold
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(registry.evict_older_than(Duration::ZERO), 1);
        assert!(!registry.contains("never-used"));
        assert!(registry.contains("accessed"));
        assert!(registry.contains("loaded"));
    }

    #[test]
    fn test_evict_respects_age_threshold() {
        let registry = ChunkRegistry::new();
        registry.register("fresh", noop_factory(), None);

        assert_eq!(registry.evict_older_than(Duration::from_secs(3600)), 0);
        assert!(registry.contains("fresh"));
    }

    #[test]
    fn test_stats_aggregation() {
        let registry = ChunkRegistry::new();
        registry.register("a", noop_factory(), Some(100));
        registry.register("b", noop_factory(), Some(200));
        registry.record_access("a");
        registry.finish_loaded("a", Arc::new(()) as ChunkModule);
        registry.finish_error("b", "boom".to_string());

        let stats = registry.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.loaded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.preloaded, 1);
        assert_eq!(stats.total_accesses, 1);
        assert_eq!(stats.estimated_bytes, 300);
    }
}
