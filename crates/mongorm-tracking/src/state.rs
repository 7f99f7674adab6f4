//! [`EntryState`] and [`StateEntry`]: per-document lifecycle tracking.

use std::collections::HashSet;
use std::sync::Arc;

use bson::oid::ObjectId;
use mongorm_cache::DocumentWrapper;
use mongorm_core::Document;
use parking_lot::RwLock;

/// A tracked document's lifecycle state.
///
/// ```text
///          ┌───────────┐ persist ok  ┌───────────┐
///  Added ─▶│  Added    │────────────▶│ Unchanged │◀──── deserialize
///          └───────────┘             └───────────┘
///                                     │  ▲
///                       controlled    │  │  persist ok
///                       property      ▼  │
///                       changed   ┌───────────┐
///                                 │ Modified  │
///                                 └───────────┘
///                                     │
///                                     ▼
///          ┌───────────┐  user   ┌───────────┐ persist ok ┌───────────┐
///          │ Unchanged │────────▶│ Deleted   │──────────▶│ Detached  │
///          └───────────┘         └───────────┘            └───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Created by the caller; not yet persisted.
    Added,
    /// A tracked property changed since the last successful persist.
    Modified,
    /// Marked for removal from the store.
    Deleted,
    /// Matches the persisted image; reclaimable.
    Unchanged,
    /// Not tracked. Transient — entries in this state are not stored.
    Detached,
}

impl EntryState {
    /// Whether an entry in this state must be held strongly (Added,
    /// Modified, Deleted) as opposed to weakly (Unchanged, Detached).
    #[must_use]
    pub fn holds_strong(self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }
}

/// One entry per tracked identity: the wrapper, the current state, and (for
/// Modified) the set of changed property names.
pub struct StateEntry<T: Document> {
    inner: RwLock<Inner<T>>,
}

struct Inner<T: Document> {
    wrapper: DocumentWrapper<T>,
    state: EntryState,
    modified_properties: HashSet<&'static str>,
}

impl<T: Document> StateEntry<T> {
    /// Builds a new entry around `doc` in `initial_state`, with the wrapper
    /// kind (strong or weak) chosen from the state per
    /// [`EntryState::holds_strong`].
    #[must_use]
    pub fn new(doc: Arc<T>, initial_state: EntryState) -> Self {
        let wrapper = if initial_state.holds_strong() {
            DocumentWrapper::strong(doc)
        } else {
            DocumentWrapper::weak(&doc)
        };
        Self {
            inner: RwLock::new(Inner {
                wrapper,
                state: initial_state,
                modified_properties: HashSet::new(),
            }),
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> EntryState {
        self.inner.read().state
    }

    /// The tracked document, or `None` if it has been reclaimed (only
    /// possible while Unchanged).
    #[must_use]
    pub fn document(&self) -> Option<Arc<T>> {
        self.inner.read().wrapper.document()
    }

    /// The entry's identity, readable even after reclamation.
    #[must_use]
    pub fn identity(&self) -> ObjectId {
        self.inner.read().wrapper.identity()
    }

    /// The entry's collection name, readable even after reclamation.
    #[must_use]
    pub fn collection_name(&self) -> &'static str {
        self.inner.read().wrapper.collection_name()
    }

    /// Whether the underlying document has been reclaimed. Always `false`
    /// for Added/Modified/Deleted, since those hold a strong reference.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        !self.inner.read().wrapper.is_alive()
    }

    /// Transitions the entry to `target`, swapping in the correct wrapper
    /// kind and clearing the modified-property set if `target` is
    /// Unchanged. Fails (returning `false`, leaving the state unchanged) if
    /// the entry is dead.
    pub fn change_state(&self, target: EntryState) -> bool {
        let mut inner = self.inner.write();
        let Some(doc) = inner.wrapper.document() else {
            return false;
        };
        inner.wrapper = if target.holds_strong() {
            DocumentWrapper::strong(doc)
        } else {
            DocumentWrapper::weak(&doc)
        };
        inner.state = target;
        if matches!(target, EntryState::Unchanged) {
            inner.modified_properties.clear();
        }
        true
    }

    /// Replaces the tracked document, preserving the entry's current state
    /// and therefore its strong/weak wrapper kind. Used when
    /// `addOrGetExisting` finds a live entry for the same identity but a
    /// different in-memory instance (or a dead Unchanged entry being
    /// revived).
    pub fn rebind(&self, doc: Arc<T>) {
        let mut inner = self.inner.write();
        inner.wrapper = if inner.state.holds_strong() {
            DocumentWrapper::strong(doc)
        } else {
            DocumentWrapper::weak(&doc)
        };
    }

    /// Records that `property` differs from the persisted image.
    pub fn note_property_changed(&self, property: &'static str) {
        self.inner.write().modified_properties.insert(property);
    }

    /// Whether `property` was recorded as changed.
    #[must_use]
    pub fn is_property_changed(&self, property: &str) -> bool {
        self.inner.read().modified_properties.contains(property)
    }

    /// The full set of properties recorded as changed.
    #[must_use]
    pub fn modified_properties(&self) -> HashSet<&'static str> {
        self.inner.read().modified_properties.clone()
    }
}

impl<T: Document> std::fmt::Debug for StateEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("StateEntry")
            .field("id", &inner.wrapper.identity())
            .field("state", &inner.state)
            .field("modified_properties", &inner.modified_properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongorm_core::{ChangeNotifier, NavigationMap};
    use parking_lot::RwLock as TestRwLock;

    struct Widget {
        id: TestRwLock<ObjectId>,
        nav: TestRwLock<NavigationMap>,
        notifier: ChangeNotifier,
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

    fn widget() -> Arc<Widget> {
        Arc::new(Widget {
            id: TestRwLock::new(ObjectId::new()),
            nav: TestRwLock::new(NavigationMap::new()),
            notifier: ChangeNotifier::new(),
        })
    }

    #[test]
    fn added_entry_holds_strong_reference() {
        let doc = widget();
        let weak_check = Arc::downgrade(&doc);
        let entry = StateEntry::new(Arc::clone(&doc), EntryState::Added);
        drop(doc);
        assert!(weak_check.upgrade().is_some(), "Added must hold strongly");
        assert!(!entry.is_dead());
    }

    #[test]
    fn unchanged_entry_holds_weak_reference() {
        let doc = widget();
        let entry = StateEntry::new(Arc::clone(&doc), EntryState::Unchanged);
        drop(doc);
        assert!(entry.is_dead());
        assert!(entry.document().is_none());
    }

    #[test]
    fn change_state_to_unchanged_clears_modified_properties() {
        let doc = widget();
        let entry = StateEntry::new(doc, EntryState::Modified);
        entry.note_property_changed("name");
        assert!(entry.is_property_changed("name"));
        assert!(entry.change_state(EntryState::Unchanged));
        assert!(!entry.is_property_changed("name"));
    }

    #[test]
    fn change_state_is_idempotent() {
        let doc = widget();
        let entry = StateEntry::new(doc, EntryState::Added);
        assert!(entry.change_state(EntryState::Added));
        assert_eq!(entry.state(), EntryState::Added);
    }

    #[test]
    fn change_state_fails_on_dead_entry() {
        let doc = widget();
        let entry = StateEntry::new(Arc::clone(&doc), EntryState::Unchanged);
        drop(doc);
        assert!(!entry.change_state(EntryState::Modified));
        assert_eq!(entry.state(), EntryState::Unchanged);
    }

    #[test]
    fn identity_and_collection_survive_reclamation() {
        let doc = widget();
        let id = doc.id();
        let entry = StateEntry::new(Arc::clone(&doc), EntryState::Unchanged);
        drop(doc);
        assert_eq!(entry.identity(), id);
        assert_eq!(entry.collection_name(), "widgets");
    }

    #[test]
    fn modified_state_requires_nonempty_property_set_by_convention() {
        let doc = widget();
        let entry = StateEntry::new(doc, EntryState::Modified);
        entry.note_property_changed("name");
        assert!(!entry.modified_properties().is_empty());
    }
}
