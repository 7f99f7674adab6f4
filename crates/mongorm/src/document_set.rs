//! [`DocumentSet`]: the typed, per-collection facade user code interacts
//! with directly.

use std::sync::Arc;

use bson::doc;
use bson::oid::ObjectId;
use bson::Document as BsonDocument;
use futures::stream::TryStreamExt;
use mongodb::Collection;

use mongorm_core::DocumentFields;
use mongorm_serde::{decode, encode};
use mongorm_tracking::{EntryState, StateEntry, StateManager};

use crate::cancel::{race, CancelToken};
use crate::error::Result;

/// A typed view over one document kind's collection and state manager.
///
/// Obtained from [`crate::RepositoryContext::document_set`]; never
/// constructed directly.
pub struct DocumentSet<T: DocumentFields + Default + 'static> {
    collection: Collection<BsonDocument>,
    manager: Arc<StateManager<T>>,
}

impl<T: DocumentFields + Default + 'static> DocumentSet<T> {
    pub(crate) fn new(collection: Collection<BsonDocument>, manager: Arc<StateManager<T>>) -> Self {
        Self { collection, manager }
    }

    /// Tracks `doc` as newly created. Returns its entry handle.
    pub fn add(&self, doc: Arc<T>) -> Arc<StateEntry<T>> {
        self.manager.add_or_get_existing(doc, EntryState::Added)
    }

    /// Tracks `doc` as already persisted and unmodified.
    pub fn attach(&self, doc: Arc<T>) -> Arc<StateEntry<T>> {
        self.manager.add_or_get_existing(doc, EntryState::Unchanged)
    }

    /// Tracks `doc` as modified, to be persisted as a replace on the next
    /// save.
    pub fn update(&self, doc: Arc<T>) -> Arc<StateEntry<T>> {
        self.manager.add_or_get_existing(doc, EntryState::Modified)
    }

    /// Tracks `doc` as marked for removal.
    pub fn remove(&self, doc: Arc<T>) -> Arc<StateEntry<T>> {
        self.manager.add_or_get_existing(doc, EntryState::Deleted)
    }

    /// Direct fetch by identity. Goes through the identity-preserving
    /// decode path, so a concurrently tracked instance for the same
    /// identity is reused rather than duplicated.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying find fails or the returned
    /// record cannot be decoded.
    pub async fn find(&self, id: ObjectId) -> Result<Option<Arc<T>>> {
        let raw = self.collection.find_one(doc! { "_id": id }).await?;
        raw.map(|raw| decode(&raw, &self.manager)).transpose().map_err(Into::into)
    }

    /// Pass-through filtered fetch. `filter` is a raw `bson::Document`
    /// built by the caller; there is no query-translation layer here.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying find fails or a returned record
    /// cannot be decoded.
    pub async fn find_many(&self, filter: BsonDocument) -> Result<Vec<Arc<T>>> {
        let mut cursor = self.collection.find(filter).await?;
        let mut out = Vec::new();
        while let Some(raw) = cursor.try_next().await? {
            out.push(decode(&raw, &self.manager)?);
        }
        Ok(out)
    }

    /// `find_many` with an implicit limit of one.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying find fails or the returned
    /// record cannot be decoded.
    pub async fn find_one(&self, filter: BsonDocument) -> Result<Option<Arc<T>>> {
        let raw = self.collection.find_one(filter).await?;
        raw.map(|raw| decode(&raw, &self.manager)).transpose().map_err(Into::into)
    }

    /// `find`, but cooperatively cancellable: if `token` is cancelled
    /// before the underlying find completes, returns `Ok(None)` without
    /// raising, matching the store-level find's documented cancellation
    /// behavior.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying find fails or the returned
    /// record cannot be decoded.
    pub async fn find_cancellable(&self, id: ObjectId, token: &CancelToken) -> Result<Option<Arc<T>>> {
        match race(token, self.find(id)).await {
            Some(result) => result,
            None => Ok(None),
        }
    }

    /// `find_many`, but cooperatively cancellable: if `token` is cancelled
    /// before the underlying find completes, returns `Ok(vec![])` without
    /// raising.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying find fails or a returned record
    /// cannot be decoded.
    pub async fn find_many_cancellable(&self, filter: BsonDocument, token: &CancelToken) -> Result<Vec<Arc<T>>> {
        match race(token, self.find_many(filter)).await {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }

    /// Deletes the document at `id` directly against the store, bypassing
    /// the tracked set entirely. If a tracked copy of this identity
    /// exists and is later saved, it will resurrect the row as an insert
    /// — the caller is responsible for also detaching any tracked copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying delete fails.
    pub async fn delete(&self, id: ObjectId) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    /// Deletes every document matching `filter` directly against the
    /// store, with the same tracked-set bypass caveat as [`Self::delete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying delete fails.
    pub async fn delete_where(&self, filter: BsonDocument) -> Result<u64> {
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    /// Deletes every document in the collection. See [`Self::delete`] for
    /// the tracked-set bypass caveat.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying delete fails.
    pub async fn delete_all(&self) -> Result<u64> {
        self.delete_where(doc! {}).await
    }

    /// Cardinality of the underlying collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying count fails.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }

    /// Serializes `doc` the way a save would, without persisting it.
    /// Exposed for the save pipeline and for tests; not typically called
    /// directly by application code.
    #[must_use]
    pub fn encode(doc: &T) -> BsonDocument {
        encode(doc)
    }
}
