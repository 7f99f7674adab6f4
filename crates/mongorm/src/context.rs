//! [`RepositoryContext`]: the top-level session object.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::Document as BsonDocument;
use mongodb::{Collection, Database};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use mongorm_core::{CoreError, DocumentFields};
use mongorm_serde::{decode, encode};
use mongorm_tracking::{
    CacheCleaner, EntryState, NotifyReclaimSignal, ReclaimSignal, ShutdownSignal, StateEntry, StateManager, StateMask,
};
use mongorm_wire::{delete_many, insert_many, reload as wire_reload, update_many};

use crate::config::MongormConfig;
use crate::document_set::DocumentSet;
use crate::error::{MongormError, Result};
use crate::statistics::{ContextStatistics, TypeStatistics};

/// Per-type behavior the context needs without knowing the concrete type
/// at the call site — the save pipeline and statistics snapshot both walk
/// every registered type, but the registry itself is type-erased (Rust's
/// static typing means each document kind gets its own monomorphic
/// `StateManager<T>`, so there is no single concrete type to iterate
/// over).
#[async_trait]
trait TypeErasedManager: Send + Sync {
    async fn save_changes(&self, database: &Database, slice_size: usize) -> Result<usize>;
    fn statistics(&self) -> TypeStatistics;
}

struct TypedManager<T: DocumentFields + Default + 'static> {
    manager: Arc<StateManager<T>>,
}

#[async_trait]
impl<T> TypeErasedManager for TypedManager<T>
where
    T: DocumentFields + Default + 'static,
{
    async fn save_changes(&self, database: &Database, slice_size: usize) -> Result<usize> {
        save_dirty_entries(&self.manager, database, slice_size).await
    }

    fn statistics(&self) -> TypeStatistics {
        TypeStatistics {
            type_name: T::collection_name(),
            added: self.manager.count(mask_for(EntryState::Added)),
            modified: self.manager.count(mask_for(EntryState::Modified)),
            deleted: self.manager.count(mask_for(EntryState::Deleted)),
            unchanged_live: self.manager.count(mask_for(EntryState::Unchanged)),
            unchanged_capacity: self.manager.unchanged_capacity(),
            total_reclaimed: self.manager.total_reclaimed(),
        }
    }
}

fn mask_for(state: EntryState) -> StateMask {
    match state {
        EntryState::Added => StateMask {
            added: true,
            ..StateMask::default()
        },
        EntryState::Modified => StateMask {
            modified: true,
            ..StateMask::default()
        },
        EntryState::Deleted => StateMask {
            deleted: true,
            ..StateMask::default()
        },
        EntryState::Unchanged => StateMask {
            unchanged: true,
            ..StateMask::default()
        },
        EntryState::Detached => StateMask::default(),
    }
}

struct Registration {
    any: Box<dyn Any + Send + Sync>,
    erased: Arc<dyn TypeErasedManager>,
}

/// Owns one state manager per tracked document type, one cache cleaner
/// task per type, the database handle, and configuration. The entry
/// point for everything else in this crate.
pub struct RepositoryContext {
    database: Database,
    config: MongormConfig,
    registrations: RwLock<HashMap<TypeId, Registration>>,
    cleaner_handles: RwLock<Vec<JoinHandle<()>>>,
    cleaner_shutdowns: RwLock<Vec<ShutdownSignal>>,
}

impl RepositoryContext {
    /// Connects to `config.mongo_uri` and builds a context over
    /// `config.database`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is malformed or the
    /// client cannot be constructed, or if `config` fails validation.
    pub async fn connect(config: MongormConfig) -> Result<Self> {
        config.validate()?;
        let client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
        let database = client.database(&config.database);
        Ok(Self::new(database, config))
    }

    /// Builds a context over an already-constructed database handle.
    #[must_use]
    pub fn new(database: Database, config: MongormConfig) -> Self {
        Self {
            database,
            config,
            registrations: RwLock::new(HashMap::new()),
            cleaner_handles: RwLock::new(Vec::new()),
            cleaner_shutdowns: RwLock::new(Vec::new()),
        }
    }

    /// The state manager for `T`, creating it (and spawning its cache
    /// cleaner) on first access.
    pub fn state_manager<T>(&self) -> Arc<StateManager<T>>
    where
        T: DocumentFields + Default + 'static,
    {
        let type_id = TypeId::of::<T>();
        if let Some(found) = self.registrations.read().get(&type_id) {
            return downcast(found);
        }

        let mut registrations = self.registrations.write();
        if let Some(found) = registrations.get(&type_id) {
            return downcast(found);
        }

        let manager = StateManager::<T>::new();
        self.spawn_cleaner(Arc::clone(&manager));
        registrations.insert(
            type_id,
            Registration {
                any: Box::new(Arc::clone(&manager)),
                erased: Arc::new(TypedManager {
                    manager: Arc::clone(&manager),
                }),
            },
        );
        manager
    }

    fn spawn_cleaner<T: DocumentFields + Default + 'static>(&self, manager: Arc<StateManager<T>>) {
        let signal: Arc<dyn ReclaimSignal> = Arc::new(NotifyReclaimSignal::new());
        let cleaner = CacheCleaner::new(manager, signal, self.config.cache_cleaner.clone());
        let shutdown = cleaner.shutdown_handle();
        let handle = cleaner.spawn();
        self.cleaner_handles.write().push(handle);
        self.cleaner_shutdowns.write().push(shutdown);
    }

    /// The typed facade for document kind `T`.
    pub fn document_set<T>(&self) -> DocumentSet<T>
    where
        T: DocumentFields + Default + 'static,
    {
        let collection: Collection<BsonDocument> = self.database.collection(T::collection_name());
        DocumentSet::new(collection, self.state_manager::<T>())
    }

    /// Persists every Added/Modified/Deleted entry of type `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if any bulk command fails outright (partial
    /// per-document failures are absorbed into the committed count and do
    /// not fail the call).
    pub async fn save_changes<T>(&self) -> Result<usize>
    where
        T: DocumentFields + Default + 'static,
    {
        let manager = self.state_manager::<T>();
        save_dirty_entries(&manager, &self.database, self.config.save_slice_size).await
    }

    /// Persists dirty entries across every document type registered with
    /// this context so far (types never accessed through
    /// [`Self::state_manager`] or [`Self::document_set`] are not included,
    /// since nothing has tracked anything for them).
    ///
    /// # Errors
    ///
    /// Returns an error if any type's save pass fails outright.
    pub async fn save_all(&self) -> Result<usize> {
        let managers: Vec<Arc<dyn TypeErasedManager>> =
            self.registrations.read().values().map(|r| Arc::clone(&r.erased)).collect();
        let mut total = 0;
        for manager in managers {
            total += manager.save_changes(&self.database, self.config.save_slice_size).await?;
        }
        Ok(total)
    }

    /// Re-fetches `entry`'s identity from the store and hydrates it
    /// in-place, resetting the entry to Unchanged. Any property edits
    /// made concurrently with this call are discarded — this is
    /// last-writer-wins from the store's perspective.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] (wrapped in
    /// [`MongormError::Core`]) if `entry` is Detached — a detached entry is
    /// no longer tracked, so there is nothing for a reload to reset.
    /// Returns [`MongormError::ConcurrentFind`] if the document has been
    /// concurrently deleted from the store.
    pub async fn reload<T>(&self, entry: &Arc<StateEntry<T>>) -> Result<Arc<T>>
    where
        T: DocumentFields + Default + 'static,
    {
        let id = entry.identity();
        if entry.state() == EntryState::Detached {
            return Err(MongormError::Core(CoreError::InvalidState {
                id: id.to_hex(),
                reason: "entry is detached".to_string(),
            }));
        }
        let collection: Collection<BsonDocument> = self.database.collection(T::collection_name());
        let raw = wire_reload(&collection, id).await?.ok_or(MongormError::ConcurrentFind(id))?;
        let manager = self.state_manager::<T>();
        Ok(decode(&raw, &manager)?)
    }

    /// A snapshot of per-type entry counts and cache health across every
    /// registered document type.
    #[must_use]
    pub fn statistics(&self) -> ContextStatistics {
        ContextStatistics {
            per_type: self.registrations.read().values().map(|r| r.erased.statistics()).collect(),
        }
    }

    /// Requests cooperative shutdown of every type's cache cleaner task.
    /// Does not wait for them to exit.
    pub fn shutdown(&self) {
        for shutdown in self.cleaner_shutdowns.read().iter() {
            shutdown.signal();
        }
    }
}

fn downcast<T: DocumentFields + Default + 'static>(found: &Registration) -> Arc<StateManager<T>> {
    found
        .any
        .downcast_ref::<Arc<StateManager<T>>>()
        .expect("TypeId lookup guarantees the concrete type matches")
        .clone()
}

async fn save_dirty_entries<T>(manager: &Arc<StateManager<T>>, database: &Database, slice_size: usize) -> Result<usize>
where
    T: DocumentFields + 'static,
{
    let collection: Collection<BsonDocument> = database.collection(T::collection_name());
    let mut committed = 0;
    committed += save_state(manager, &collection, EntryState::Added, slice_size).await?;
    committed += save_state(manager, &collection, EntryState::Modified, slice_size).await?;
    committed += save_state(manager, &collection, EntryState::Deleted, slice_size).await?;
    Ok(committed)
}

async fn save_state<T>(
    manager: &Arc<StateManager<T>>,
    collection: &Collection<BsonDocument>,
    state: EntryState,
    slice_size: usize,
) -> Result<usize>
where
    T: DocumentFields + 'static,
{
    let entries = manager.get_entries(mask_for(state));
    let mut committed = 0;

    for slice in entries.chunks(slice_size.max(1)) {
        let outcome = match state {
            EntryState::Added => {
                let docs: Vec<BsonDocument> = slice.iter().filter_map(|e| e.document().map(|d| encode(&*d))).collect();
                if docs.is_empty() {
                    continue;
                }
                insert_many(collection, docs).await?
            }
            EntryState::Modified => {
                let pairs: Vec<(ObjectId, BsonDocument)> = slice
                    .iter()
                    .filter_map(|e| e.document().map(|d| (d.id(), encode(&*d))))
                    .collect();
                if pairs.is_empty() {
                    continue;
                }
                update_many(collection, pairs).await?
            }
            EntryState::Deleted => {
                let ids: Vec<ObjectId> = slice.iter().map(StateEntry::identity).collect();
                delete_many(collection, ids).await?
            }
            EntryState::Unchanged | EntryState::Detached => continue,
        };

        let failed = outcome.failed_indices();
        let target = if state == EntryState::Deleted {
            EntryState::Detached
        } else {
            EntryState::Unchanged
        };
        for (index, entry) in slice.iter().enumerate() {
            if failed.contains(&index) {
                continue;
            }
            manager.change_document_state(entry, target);
            committed += 1;
        }
    }

    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongorm_core::{ChangeNotifier, Document, NavigationMap};

    #[test]
    fn mask_for_detached_is_empty() {
        let mask = mask_for(EntryState::Detached);
        assert!(!mask.added && !mask.modified && !mask.deleted && !mask.unchanged);
    }

    #[test]
    fn mask_for_added_selects_only_added() {
        let mask = mask_for(EntryState::Added);
        assert!(mask.added);
        assert!(!mask.modified && !mask.deleted && !mask.unchanged);
    }

    #[derive(Default)]
    struct Widget {
        id: RwLock<ObjectId>,
        nav: RwLock<NavigationMap>,
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

    impl DocumentFields for Widget {
        fn set_field_bson(&self, _name: &str, _value: bson::Bson) -> std::result::Result<(), CoreError> {
            Err(CoreError::ArgumentError("widget has no tracked fields".to_string()))
        }
        fn get_field_bson(&self, _name: &str) -> Option<bson::Bson> {
            None
        }
        fn field_names() -> &'static [&'static str] {
            &[]
        }
        fn single_reference_names() -> &'static [&'static str] {
            &[]
        }
        fn collection_reference_names() -> &'static [&'static str] {
            &[]
        }
    }

    #[tokio::test]
    async fn reload_rejects_a_detached_entry_before_touching_the_store() {
        let client = mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .expect("client construction does not require a reachable server");
        let context = RepositoryContext::new(
            client.database("mongorm_context_tests"),
            MongormConfig::from_toml_str(
                r#"
                mongo_uri = "mongodb://localhost:27017"
                database = "mongorm_context_tests"
                "#,
            )
            .unwrap(),
        );

        let widget = Arc::new(Widget::default());
        let entry = Arc::new(StateEntry::new(widget, EntryState::Detached));

        let err = context.reload(&entry).await.unwrap_err();
        assert!(matches!(
            err,
            MongormError::Core(CoreError::InvalidState { reason, .. }) if reason == "entry is detached"
        ));
    }
}
