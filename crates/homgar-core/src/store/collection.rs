// ── Generic reactive keyed collection ──
//
// Lock-free concurrent storage with O(1) lookups and push-based
// change notification via `watch` channels.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// Ordered point-in-time view of a collection.
pub type Snapshot<T> = Arc<BTreeMap<String, Arc<T>>>;

/// A lock-free, reactive collection keyed by string.
///
/// Uses `DashMap` for concurrent lookups and a `watch` channel for
/// change notification. Every mutation bumps a version counter and
/// rebuilds the snapshot that subscribers receive; batch operations
/// publish once.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,

    /// Version counter, bumped on every published mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(BTreeMap::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or update several entities, publishing one snapshot.
    pub(crate) fn upsert_many(&self, items: impl IntoIterator<Item = (String, T)>) -> usize {
        let mut count = 0;
        for (key, entity) in items {
            self.by_key.insert(key, Arc::new(entity));
            count += 1;
        }
        if count > 0 {
            self.publish();
        }
        count
    }

    /// Upsert all incoming entities, then drop every key not among them.
    /// Subscribers see one transition, never an empty intermediate state.
    pub(crate) fn replace_all(&self, items: Vec<(String, T)>) {
        let incoming: HashSet<String> = items.iter().map(|(k, _)| k.clone()).collect();
        for (key, entity) in items {
            self.by_key.insert(key, Arc::new(entity));
        }
        self.by_key.retain(|key, _| incoming.contains(key));
        self.publish();
    }

    pub(crate) fn get_by_key(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Entities matching `pred`, in key order.
    pub(crate) fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<Arc<T>> {
        self.snapshot()
            .values()
            .filter(|e| pred(e))
            .cloned()
            .collect()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild the snapshot, broadcast it and bump the version.
    fn publish(&self) {
        let values: BTreeMap<String, Arc<T>> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}
