use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use bson::oid::ObjectId;
use parking_lot::RwLock;

/// Number of structural mutations (inserts, revivals, removals) the cache
/// tolerates before [`DocumentCache::approximate_count`] forces a full
/// recount.
const RECOUNT_THRESHOLD: u32 = 10;

/// A keyed map with a per-entry liveness predicate and an incremental
/// `flush`.
///
/// This is the store the state manager uses for its Unchanged entries:
/// values are held behind weak wrappers elsewhere, and `is_dead` tells the
/// cache which slots no longer point at a live document. The cache never
/// inspects `V` itself beyond that predicate, so it has no notion of
/// documents, states, or wrappers.
///
/// # Examples
///
/// ```
/// use mongorm_cache::DocumentCache;
/// use bson::oid::ObjectId;
///
/// let cache: DocumentCache<bool> = DocumentCache::new(|_, alive| !*alive);
/// let id = ObjectId::new();
/// cache.set(id, true);
/// assert!(cache.contains(&id));
/// ```
pub struct DocumentCache<V> {
    entries: RwLock<HashMap<ObjectId, V>>,
    is_dead: Box<dyn Fn(&ObjectId, &V) -> bool + Send + Sync>,
    approx_count: AtomicI64,
    mutations_since_recount: AtomicU32,
}

impl<V> DocumentCache<V> {
    /// Creates an empty cache using `is_dead` to decide whether a stored
    /// value is still live.
    pub fn new<F>(is_dead: F) -> Self
    where
        F: Fn(&ObjectId, &V) -> bool + Send + Sync + 'static,
    {
        Self {
            entries: RwLock::new(HashMap::new()),
            is_dead: Box::new(is_dead),
            approx_count: AtomicI64::new(0),
            mutations_since_recount: AtomicU32::new(RECOUNT_THRESHOLD),
        }
    }

    /// Inserts or unconditionally overwrites the entry at `key`.
    pub fn set(&self, key: ObjectId, value: V) {
        self.entries.write().insert(key, value);
        self.mutations_since_recount.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the live entry at `key`, constructing one with `make` if
    /// absent, or replacing a dead one with `revive(key, dead_value)`.
    pub fn add_or_get<M, R>(&self, key: ObjectId, make: M, revive: R) -> V
    where
        V: Clone,
        M: FnOnce(&ObjectId) -> V,
        R: FnOnce(&ObjectId, &V) -> V,
    {
        {
            let guard = self.entries.upgradable_read();
            if let Some(existing) = guard.get(&key) {
                if !(self.is_dead)(&key, existing) {
                    return existing.clone();
                }
                let revived = revive(&key, existing);
                let mut guard = parking_lot::RwLockUpgradableReadGuard::upgrade(guard);
                guard.insert(key, revived.clone());
                self.mutations_since_recount.fetch_add(1, Ordering::Relaxed);
                return revived;
            }
            let created = make(&key);
            let mut guard = parking_lot::RwLockUpgradableReadGuard::upgrade(guard);
            guard.insert(key, created.clone());
            self.mutations_since_recount.fetch_add(1, Ordering::Relaxed);
            created
        }
    }

    /// Returns the entry at `key` if present and live.
    pub fn try_get(&self, key: &ObjectId) -> Option<V>
    where
        V: Clone,
    {
        let guard = self.entries.read();
        let value = guard.get(key)?;
        if (self.is_dead)(key, value) {
            None
        } else {
            Some(value.clone())
        }
    }

    /// Whether `key` has a live entry.
    pub fn contains(&self, key: &ObjectId) -> bool {
        let guard = self.entries.read();
        guard.get(key).is_some_and(|v| !(self.is_dead)(key, v))
    }

    /// Removes the entry at `key` unconditionally, returning the previous
    /// value if any.
    pub fn remove(&self, key: &ObjectId) -> Option<V> {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            self.mutations_since_recount.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Removes at most `max_to_remove` dead entries, returning the number
    /// actually removed.
    pub fn flush(&self, max_to_remove: usize) -> usize {
        if max_to_remove == 0 {
            return 0;
        }
        let mut guard = self.entries.write();
        let dead: Vec<ObjectId> = guard
            .iter()
            .filter(|(k, v)| (self.is_dead)(k, v))
            .map(|(k, _)| *k)
            .take(max_to_remove)
            .collect();
        for key in &dead {
            guard.remove(key);
        }
        let live = guard.len() as i64;
        drop(guard);
        self.approx_count.store(live, Ordering::Relaxed);
        self.mutations_since_recount.store(0, Ordering::Relaxed);
        dead.len()
    }

    /// Total number of slots, including dead ones. This is the quantity
    /// partial clean-up percentages are computed against.
    pub fn capacity(&self) -> usize {
        self.entries.read().len()
    }

    /// A possibly-stale live-entry count, cheap to call repeatedly. Forces
    /// a full recount after enough structural mutations have accumulated
    /// since the last one.
    pub fn approximate_count(&self) -> usize {
        if self.mutations_since_recount.load(Ordering::Relaxed) >= RECOUNT_THRESHOLD {
            return self.exact_count();
        }
        self.approx_count.load(Ordering::Relaxed).max(0) as usize
    }

    /// A snapshot of every currently-live `(key, value)` pair. Used by
    /// enumeration operations that need to walk the whole live set (for
    /// example, the state manager's `getEntries`).
    pub fn snapshot(&self) -> Vec<(ObjectId, V)>
    where
        V: Clone,
    {
        self.entries
            .read()
            .iter()
            .filter(|(k, v)| !(self.is_dead)(k, v))
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    /// Forces a full live-entry scan.
    pub fn exact_count(&self) -> usize {
        let guard = self.entries.read();
        let count = guard.iter().filter(|(k, v)| !(self.is_dead)(k, v)).count();
        drop(guard);
        self.approx_count.store(count as i64, Ordering::Relaxed);
        self.mutations_since_recount.store(0, Ordering::Relaxed);
        count
    }
}
