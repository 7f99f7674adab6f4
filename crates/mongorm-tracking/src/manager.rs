//! [`StateManager`]: the identity map for one document type.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bson::oid::ObjectId;
use mongorm_cache::DocumentCache;
use mongorm_core::Document;
use parking_lot::RwLock;

use crate::cleaner::CleanupReport;
use crate::state::{EntryState, StateEntry};

/// Which state-specific stores an enumeration or count should cover.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMask {
    /// Include Added entries.
    pub added: bool,
    /// Include Modified entries.
    pub modified: bool,
    /// Include Deleted entries.
    pub deleted: bool,
    /// Include Unchanged entries.
    pub unchanged: bool,
}

impl StateMask {
    /// Every state.
    #[must_use]
    pub fn all() -> Self {
        Self {
            added: true,
            modified: true,
            deleted: true,
            unchanged: true,
        }
    }

    /// Added, Modified, and Deleted — the entries a save pass must process.
    #[must_use]
    pub fn dirty() -> Self {
        Self {
            added: true,
            modified: true,
            deleted: true,
            unchanged: false,
        }
    }

    fn includes(self, state: EntryState) -> bool {
        match state {
            EntryState::Added => self.added,
            EntryState::Modified => self.modified,
            EntryState::Deleted => self.deleted,
            EntryState::Unchanged => self.unchanged,
            EntryState::Detached => false,
        }
    }
}

struct Stores<T: Document> {
    added: HashMap<ObjectId, Arc<StateEntry<T>>>,
    modified: HashMap<ObjectId, Arc<StateEntry<T>>>,
    deleted: HashMap<ObjectId, Arc<StateEntry<T>>>,
}

impl<T: Document> Default for Stores<T> {
    fn default() -> Self {
        Self {
            added: HashMap::new(),
            modified: HashMap::new(),
            deleted: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct ManagerStats {
    last_cleanup: RwLock<Option<Instant>>,
    total_reclaimed: std::sync::atomic::AtomicU64,
    full_cleanups: std::sync::atomic::AtomicU64,
    partial_cleanups: std::sync::atomic::AtomicU64,
}

/// The percentage of the unchanged cache's capacity a partial clean-up
/// reclaims at most, as a fraction of `capacity()`.
const DEFAULT_PARTIAL_CLEANUP_PERCENT: u8 = 10;

/// The identity map for one document type: four per-state stores behind one
/// lookup surface, wired so that controlled-property changes on an
/// Unchanged document automatically move it to Modified.
pub struct StateManager<T: Document> {
    stores: RwLock<Stores<T>>,
    unchanged: DocumentCache<Arc<StateEntry<T>>>,
    suppressed: RwLock<HashSet<ObjectId>>,
    stats: ManagerStats,
    partial_cleanup_percent: u8,
}

impl<T: Document> StateManager<T> {
    /// Builds an empty state manager, wrapped in an `Arc` since its
    /// `add_or_get_existing` subscribes a weak self-reference into every
    /// tracked document's change notifier.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_partial_cleanup_percent(DEFAULT_PARTIAL_CLEANUP_PERCENT)
    }

    /// Builds an empty state manager with a non-default partial clean-up
    /// percentage.
    #[must_use]
    pub fn with_partial_cleanup_percent(percent: u8) -> Arc<Self> {
        Arc::new(Self {
            stores: RwLock::new(Stores::default()),
            unchanged: DocumentCache::new(|_, entry: &Arc<StateEntry<T>>| entry.is_dead()),
            suppressed: RwLock::new(HashSet::new()),
            stats: ManagerStats::default(),
            partial_cleanup_percent: percent,
        })
    }

    /// Looks up the entry for `key`, checking Added, Unchanged, Modified,
    /// then Deleted in order. At most one store holds any given key.
    #[must_use]
    pub fn find(&self, key: &ObjectId) -> Option<Arc<StateEntry<T>>> {
        let stores = self.stores.read();
        if let Some(entry) = stores.added.get(key) {
            return Some(Arc::clone(entry));
        }
        if let Some(entry) = self.unchanged.try_get(key) {
            return Some(entry);
        }
        if let Some(entry) = stores.modified.get(key) {
            return Some(Arc::clone(entry));
        }
        stores.deleted.get(key).map(Arc::clone)
    }

    /// Returns the entry for `doc`'s identity, creating one in
    /// `initial_state` if absent, reviving a dead Unchanged entry, or
    /// rebinding a live entry onto `doc` if the in-memory instance differs.
    /// Subscribes the manager's property-change handler into `doc` in every
    /// case.
    pub fn add_or_get_existing(self: &Arc<Self>, doc: Arc<T>, initial_state: EntryState) -> Arc<StateEntry<T>> {
        let key = doc.id();
        if let Some(existing) = self.find(&key) {
            let already_same = existing.document().is_some_and(|d| Arc::ptr_eq(&d, &doc));
            if !already_same {
                existing.rebind(Arc::clone(&doc));
            }
            self.subscribe(&existing, key);
            return existing;
        }
        let entry = Arc::new(StateEntry::new(Arc::clone(&doc), initial_state));
        self.insert_into_store(key, Arc::clone(&entry), initial_state);
        self.subscribe(&entry, key);
        entry
    }

    fn subscribe(self: &Arc<Self>, entry: &Arc<StateEntry<T>>, key: ObjectId) {
        let Some(doc) = entry.document() else {
            return;
        };
        let weak_manager = Arc::downgrade(self);
        doc.change_notifier().subscribe(move |field| {
            if let Some(manager) = weak_manager.upgrade() {
                manager.on_controlled_property_changed(key, field);
            }
        });
    }

    /// Enables or disables property-change tracking for `key`. Used by the
    /// serializer to silence hydration writes during deserialization.
    pub fn set_document_property_tracking(&self, key: ObjectId, enabled: bool) {
        let mut suppressed = self.suppressed.write();
        if enabled {
            suppressed.remove(&key);
        } else {
            suppressed.insert(key);
        }
    }

    /// Routes a controlled-property write into a state transition, unless
    /// tracking is currently suppressed for `key`.
    pub fn on_controlled_property_changed(&self, key: ObjectId, property: &'static str) {
        if self.suppressed.read().contains(&key) {
            return;
        }
        let Some(entry) = self.find(&key) else {
            return;
        };
        entry.note_property_changed(property);
        if entry.state() == EntryState::Unchanged {
            self.change_document_state(&entry, EntryState::Modified);
        }
    }

    /// Transitions `entry` to `target`: removes it from its current store,
    /// attempts the transition, and inserts it into the destination store.
    /// Returns `false` (leaving the entry in its original store and state)
    /// if the entry is dead.
    pub fn change_document_state(&self, entry: &Arc<StateEntry<T>>, target: EntryState) -> bool {
        let key = entry.identity();
        let source = entry.state();
        self.remove_from_store(key, source);
        if entry.change_state(target) {
            self.insert_into_store(key, Arc::clone(entry), target);
            true
        } else {
            self.insert_into_store(key, Arc::clone(entry), source);
            false
        }
    }

    fn insert_into_store(&self, key: ObjectId, entry: Arc<StateEntry<T>>, state: EntryState) {
        match state {
            EntryState::Added => {
                self.stores.write().added.insert(key, entry);
            }
            EntryState::Modified => {
                self.stores.write().modified.insert(key, entry);
            }
            EntryState::Deleted => {
                self.stores.write().deleted.insert(key, entry);
            }
            EntryState::Unchanged => {
                self.unchanged.set(key, entry);
            }
            EntryState::Detached => {}
        }
    }

    fn remove_from_store(&self, key: ObjectId, state: EntryState) {
        match state {
            EntryState::Added => {
                self.stores.write().added.remove(&key);
            }
            EntryState::Modified => {
                self.stores.write().modified.remove(&key);
            }
            EntryState::Deleted => {
                self.stores.write().deleted.remove(&key);
            }
            EntryState::Unchanged => {
                self.unchanged.remove(&key);
            }
            EntryState::Detached => {}
        }
    }

    /// Snapshot enumeration of every entry whose state is covered by
    /// `mask`.
    #[must_use]
    pub fn get_entries(&self, mask: StateMask) -> Vec<Arc<StateEntry<T>>> {
        let mut out = Vec::new();
        {
            let stores = self.stores.read();
            if mask.includes(EntryState::Added) {
                out.extend(stores.added.values().cloned());
            }
            if mask.includes(EntryState::Modified) {
                out.extend(stores.modified.values().cloned());
            }
            if mask.includes(EntryState::Deleted) {
                out.extend(stores.deleted.values().cloned());
            }
        }
        if mask.includes(EntryState::Unchanged) {
            out.extend(self.unchanged.snapshot().into_iter().map(|(_, v)| v));
        }
        out
    }

    /// Cardinality of the states covered by `mask`. The Unchanged term uses
    /// the cache's possibly-stale `approximate_count`.
    #[must_use]
    pub fn count(&self, mask: StateMask) -> usize {
        let mut total = 0;
        {
            let stores = self.stores.read();
            if mask.includes(EntryState::Added) {
                total += stores.added.len();
            }
            if mask.includes(EntryState::Modified) {
                total += stores.modified.len();
            }
            if mask.includes(EntryState::Deleted) {
                total += stores.deleted.len();
            }
        }
        if mask.includes(EntryState::Unchanged) {
            total += self.unchanged.approximate_count();
        }
        total
    }

    /// Flushes the unchanged cache, updating clean-up statistics. `full`
    /// removes every dead entry; a partial clean-up removes at most
    /// `partial_cleanup_percent` of the cache's total capacity.
    pub fn clean_up(&self, full: bool) -> CleanupReport {
        let budget = if full {
            usize::MAX
        } else {
            let capacity = self.unchanged.capacity();
            (capacity * usize::from(self.partial_cleanup_percent)) / 100
        };
        let removed = self.unchanged.flush(budget);
        *self.stats.last_cleanup.write() = Some(Instant::now());
        self.stats
            .total_reclaimed
            .fetch_add(removed as u64, std::sync::atomic::Ordering::Relaxed);
        if full {
            self.stats.full_cleanups.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        } else {
            self.stats
                .partial_cleanups
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        CleanupReport { removed, full }
    }

    /// Time elapsed since the last successful `clean_up`, or `None` if one
    /// has never run.
    #[must_use]
    pub fn time_since_last_cleanup(&self) -> Option<Duration> {
        self.stats.last_cleanup.read().map(|t| t.elapsed())
    }

    /// Total entries reclaimed across every `clean_up` call.
    #[must_use]
    pub fn total_reclaimed(&self) -> u64 {
        self.stats.total_reclaimed.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Number of full clean-up passes run so far.
    #[must_use]
    pub fn full_cleanup_count(&self) -> u64 {
        self.stats.full_cleanups.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Number of partial clean-up passes run so far.
    #[must_use]
    pub fn partial_cleanup_count(&self) -> u64 {
        self.stats.partial_cleanups.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// The live-vs-total state of the Unchanged cache, for statistics
    /// reporting.
    #[must_use]
    pub fn unchanged_capacity(&self) -> usize {
        self.unchanged.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongorm_core::{ChangeNotifier, NavigationMap};

    struct Widget {
        id: RwLock<ObjectId>,
        name: RwLock<String>,
        nav: RwLock<NavigationMap>,
        notifier: ChangeNotifier,
    }

    impl Widget {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                id: RwLock::new(ObjectId::new()),
                name: RwLock::new(name.to_string()),
                nav: RwLock::new(NavigationMap::new()),
                notifier: ChangeNotifier::new(),
            })
        }

        fn set_name(&self, name: &str) {
            *self.name.write() = name.to_string();
            self.notifier.notify("name");
        }
    }

    impl Document for Widget {
        fn collection_name() -> &'static str {
            "widgets"
        }
        fn id(&self) -> ObjectId {
            *self.id.read()
        }
        fn set_id(&self, id: ObjectId) {
            *self.id.write() = id;
        }
        fn navigation(&self) -> NavigationMap {
            self.nav.read().clone()
        }
        fn set_single_reference(&self, field: &'static str, id: ObjectId) {
            self.nav.write().set_single(field, id);
        }
        fn set_collection_reference(&self, field: &'static str, ids: Vec<ObjectId>) {
            self.nav.write().set_collection(field, ids);
        }
        fn change_notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }

    #[test]
    fn add_or_get_existing_returns_same_entry_for_same_document() {
        let manager = StateManager::<Widget>::new();
        let doc = Widget::new("a");
        let e1 = manager.add_or_get_existing(Arc::clone(&doc), EntryState::Added);
        let e2 = manager.add_or_get_existing(Arc::clone(&doc), EntryState::Added);
        assert!(Arc::ptr_eq(&e1, &e2));
    }

    #[test]
    fn property_change_promotes_unchanged_to_modified() {
        let manager = StateManager::<Widget>::new();
        let doc = Widget::new("a");
        let entry = manager.add_or_get_existing(Arc::clone(&doc), EntryState::Unchanged);
        assert_eq!(entry.state(), EntryState::Unchanged);
        doc.set_name("b");
        assert_eq!(entry.state(), EntryState::Modified);
        assert!(entry.is_property_changed("name"));
    }

    #[test]
    fn suppressed_tracking_does_not_transition_state() {
        let manager = StateManager::<Widget>::new();
        let doc = Widget::new("a");
        let entry = manager.add_or_get_existing(Arc::clone(&doc), EntryState::Unchanged);
        manager.set_document_property_tracking(doc.id(), false);
        doc.set_name("b");
        assert_eq!(entry.state(), EntryState::Unchanged);
        manager.set_document_property_tracking(doc.id(), true);
        doc.set_name("c");
        assert_eq!(entry.state(), EntryState::Modified);
    }

    #[test]
    fn find_checks_stores_in_order() {
        let manager = StateManager::<Widget>::new();
        let doc = Widget::new("a");
        let id = doc.id();
        manager.add_or_get_existing(Arc::clone(&doc), EntryState::Added);
        let found = manager.find(&id).expect("entry should be findable");
        assert_eq!(found.state(), EntryState::Added);
    }

    #[test]
    fn count_empty_manager_is_zero() {
        let manager = StateManager::<Widget>::new();
        assert_eq!(manager.count(StateMask::dirty()), 0);
    }

    #[test]
    fn clean_up_full_is_idempotent() {
        let manager = StateManager::<Widget>::new();
        let doc = Widget::new("a");
        manager.add_or_get_existing(Arc::clone(&doc), EntryState::Unchanged);
        drop(doc);
        let first = manager.clean_up(true);
        assert_eq!(first.removed, 1);
        let second = manager.clean_up(true);
        assert_eq!(second.removed, 0);
    }

    #[test]
    fn revival_of_dead_unchanged_entry_rebinds_to_new_document() {
        let manager = StateManager::<Widget>::new();
        let doc1 = Widget::new("a");
        let id = doc1.id();
        manager.add_or_get_existing(Arc::clone(&doc1), EntryState::Unchanged);
        drop(doc1);
        assert!(manager.find(&id).is_none(), "dead entry should not be found by find()");

        let doc2 = Widget::new("b");
        doc2.set_id(id);
        let revived = manager.add_or_get_existing(Arc::clone(&doc2), EntryState::Unchanged);
        assert!(revived.document().is_some());
        assert!(Arc::ptr_eq(&revived.document().unwrap(), &doc2));
    }
}
