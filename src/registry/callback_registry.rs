//! # Callback Registry
//!
//! Thread-safe map from correlation id to an owned callback handle.
//!
//! The registry is the only place a handle lives between "operation started"
//! and "result delivered". Lookups and removals may race from any thread:
//! the map is sharded so a delivery for one id never waits behind a mutation
//! of an unrelated id, and a handle removed by one thread is never observed
//! again by another.
//!
//! ```rust
//! use std::sync::Arc;
//! use script_bridge::registry::CallbackRegistry;
//!
//! let registry: CallbackRegistry<&'static str> = CallbackRegistry::new("example");
//! registry.set(7, Arc::new("handler"));
//! assert_eq!(registry.remove(7).as_deref(), Some(&"handler"));
//! assert!(registry.get(7).is_none());
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use super::CorrelationId;

/// Metrics about registered (in-flight) handles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryMetrics {
    /// Handles currently registered
    pub pending_count: usize,
    /// Age of the oldest registered handle in milliseconds
    pub oldest_pending_age_ms: Option<u64>,
    /// Age of the newest registered handle in milliseconds
    pub newest_pending_age_ms: Option<u64>,
    /// Id of the oldest registered handle
    pub oldest_id: Option<CorrelationId>,
    /// Handles older than the warning threshold
    pub aging_count: usize,
}

struct Entry<H> {
    handle: Arc<H>,
    registered_at: Instant,
}

/// Registry of in-flight callback handles keyed by correlation id
pub struct CallbackRegistry<H> {
    kind: &'static str,
    entries: DashMap<CorrelationId, Entry<H>>,
}

impl<H> std::fmt::Debug for CallbackRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("kind", &self.kind)
            .field("pending_count", &self.len())
            .finish()
    }
}

impl<H> CallbackRegistry<H> {
    /// Create an empty registry. `kind` names the handles in logs.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Insert or replace the handle for `id`. A replaced handle is dropped.
    pub fn set(&self, id: CorrelationId, handle: Arc<H>) {
        let previous = self.entries.insert(
            id,
            Entry {
                handle,
                registered_at: Instant::now(),
            },
        );
        if previous.is_some() {
            warn!(kind = self.kind, id = id, "Replaced registered handle");
        }
    }

    /// Currently registered handle for `id`.
    ///
    /// The returned handle is a shared reference; the entry stays registered.
    pub fn get(&self, id: CorrelationId) -> Option<Arc<H>> {
        self.entries.get(&id).map(|entry| Arc::clone(&entry.handle))
    }

    /// Remove the entry for `id`, returning its handle if one was registered
    pub fn remove(&self, id: CorrelationId) -> Option<Arc<H>> {
        self.entries.remove(&id).map(|(_, entry)| entry.handle)
    }

    pub fn contains(&self, id: CorrelationId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Release every handle without invoking it. Returns how many were dropped.
    pub fn reset(&self) -> usize {
        let mut released = 0;
        self.entries.retain(|_, _| {
            released += 1;
            false
        });
        debug!(kind = self.kind, released = released, "Registry reset");
        released
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of registry health.
    ///
    /// Entries older than `aging_threshold` are counted in `aging_count`; a
    /// high count means the transport is not delivering.
    pub fn metrics(&self, aging_threshold: Duration) -> RegistryMetrics {
        if self.entries.is_empty() {
            return RegistryMetrics::default();
        }

        let now = Instant::now();
        let mut ages: Vec<(CorrelationId, u64)> = self
            .entries
            .iter()
            .map(|entry| {
                let age = now.duration_since(entry.value().registered_at).as_millis() as u64;
                (*entry.key(), age)
            })
            .collect();

        // newest first, oldest last
        ages.sort_by_key(|(_, age)| *age);

        let aging_count = ages
            .iter()
            .filter(|(_, age)| Duration::from_millis(*age) > aging_threshold)
            .count();

        RegistryMetrics {
            pending_count: ages.len(),
            oldest_pending_age_ms: ages.last().map(|(_, age)| *age),
            newest_pending_age_ms: ages.first().map(|(_, age)| *age),
            oldest_id: ages.last().map(|(id, _)| *id),
            aging_count,
        }
    }

    /// Warn about every entry older than `aging_threshold`. Returns the count.
    pub fn log_aging_entries(&self, aging_threshold: Duration) -> usize {
        let now = Instant::now();
        let mut aging = 0;
        for entry in self.entries.iter() {
            let age = now.duration_since(entry.value().registered_at);
            if age > aging_threshold {
                aging += 1;
                warn!(
                    kind = self.kind,
                    id = *entry.key(),
                    age_ms = age.as_millis(),
                    threshold_ms = aging_threshold.as_millis(),
                    "Registered handle still awaiting delivery"
                );
            }
        }
        aging
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_set_get_remove() {
        let registry = CallbackRegistry::new("test");
        registry.set(1, Arc::new("one"));

        assert_eq!(registry.get(1).as_deref(), Some(&"one"));
        assert!(registry.contains(1));
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.remove(1).as_deref(), Some(&"one"));
        assert!(registry.get(1).is_none());
        assert!(registry.remove(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replace_drops_previous_handle() {
        let drops = Arc::new(AtomicUsize::new(0));
        let registry = CallbackRegistry::new("test");
        registry.set(3, Arc::new(DropCounter(Arc::clone(&drops))));
        registry.set(3, Arc::new(DropCounter(Arc::clone(&drops))));

        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reset_releases_without_invoking() {
        let drops = Arc::new(AtomicUsize::new(0));
        let registry = CallbackRegistry::new("test");
        for id in 1..=5 {
            registry.set(id, Arc::new(DropCounter(Arc::clone(&drops))));
        }

        assert_eq!(registry.reset(), 5);
        assert_eq!(drops.load(Ordering::SeqCst), 5);
        for id in 1..=5 {
            assert!(registry.get(id).is_none());
        }

        registry.set(6, Arc::new(DropCounter(Arc::clone(&drops))));
        assert!(registry.get(6).is_some());
    }

    #[test]
    fn test_reset_counts_only_entries_it_drops() {
        let registry = Arc::new(CallbackRegistry::new("test"));
        for id in 0..1_000 {
            registry.set(id, Arc::new(id));
        }

        let remover = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || (0..1_000).filter(|id| registry.remove(*id).is_some()).count())
        };
        let released = registry.reset();
        let removed = remover.join().unwrap();

        assert_eq!(released + removed, 1_000);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handle_outlives_removal_while_shared() {
        let registry = CallbackRegistry::new("test");
        registry.set(9, Arc::new(String::from("in flight")));

        let borrowed = registry.get(9).unwrap();
        registry.remove(9);
        assert_eq!(borrowed.as_str(), "in flight");
    }

    #[test]
    fn test_metrics_empty() {
        let registry: CallbackRegistry<()> = CallbackRegistry::new("test");
        assert_eq!(
            registry.metrics(Duration::from_secs(1)),
            RegistryMetrics::default()
        );
    }

    #[test]
    fn test_metrics_counts_aging_entries() {
        let registry = CallbackRegistry::new("test");
        registry.set(1, Arc::new(()));
        std::thread::sleep(Duration::from_millis(20));
        registry.set(2, Arc::new(()));

        let metrics = registry.metrics(Duration::from_millis(10));
        assert_eq!(metrics.pending_count, 2);
        assert_eq!(metrics.oldest_id, Some(1));
        assert!(metrics.aging_count >= 1);
        assert!(metrics.oldest_pending_age_ms >= metrics.newest_pending_age_ms);

        assert_eq!(registry.log_aging_entries(Duration::from_secs(60)), 0);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let registry = Arc::new(CallbackRegistry::new("test"));
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let id = t * 1000 + i;
                        registry.set(id, Arc::new(id));
                        assert_eq!(registry.get(id).as_deref(), Some(&id));
                        if i % 2 == 0 {
                            registry.remove(id);
                        }
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(registry.len(), 4 * 250);
    }
}
