//! Entry handles: user-facing views over a tracked document's navigation
//! and scalar properties.

use std::marker::PhantomData;
use std::sync::Arc;

use bson::doc;
use bson::oid::ObjectId;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use mongorm_core::{CoreError, Document, DocumentFields};

use crate::document_set::DocumentSet;
use crate::error::Result;

/// A view over a single-reference navigation property.
///
/// `load()` resolves the stored identity through `referent_set` and
/// assigns the result back onto the owning document's navigation map.
pub struct ReferenceEntry<T, R>
where
    T: Document,
    R: DocumentFields + Default + 'static,
{
    owner: Arc<T>,
    field: &'static str,
    referent_set: DocumentSet<R>,
    current: RwLock<Option<Arc<R>>>,
}

impl<T, R> ReferenceEntry<T, R>
where
    T: Document,
    R: DocumentFields + Default + 'static,
{
    /// Builds a handle over `owner`'s `field` navigation property,
    /// resolved against `referent_set`.
    #[must_use]
    pub fn new(owner: Arc<T>, field: &'static str, referent_set: DocumentSet<R>) -> Self {
        Self {
            owner,
            field,
            referent_set,
            current: RwLock::new(None),
        }
    }

    /// The referent, if it has been loaded this session.
    #[must_use]
    pub fn current_value(&self) -> Option<Arc<R>> {
        self.current.read().clone()
    }

    /// True if the referent is already loaded, or the stored identity is
    /// empty (there is nothing to load).
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some() || self.owner.navigation().single(self.field).is_none()
    }

    /// Reads the stored identity from the owner's navigation map, fetches
    /// the referent, and assigns it through the controlled setter. A
    /// no-op returning `None` if no identity is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying find fails.
    pub async fn load(&self) -> Result<Option<Arc<R>>> {
        let Some(id) = self.owner.navigation().single(self.field) else {
            return Ok(None);
        };
        let referent = self.referent_set.find(id).await?;
        if let Some(referent) = &referent {
            self.owner.set_single_reference(self.field, referent.id());
            *self.current.write() = Some(Arc::clone(referent));
        }
        Ok(referent)
    }
}

/// A view over a collection-reference navigation property.
pub struct CollectionEntry<T, R>
where
    T: Document,
    R: DocumentFields + Default + 'static,
{
    owner: Arc<T>,
    field: &'static str,
    referent_set: DocumentSet<R>,
    current: RwLock<Option<Vec<Arc<R>>>>,
}

impl<T, R> CollectionEntry<T, R>
where
    T: Document,
    R: DocumentFields + Default + 'static,
{
    /// Builds a handle over `owner`'s `field` collection-reference
    /// property, resolved against `referent_set`.
    #[must_use]
    pub fn new(owner: Arc<T>, field: &'static str, referent_set: DocumentSet<R>) -> Self {
        Self {
            owner,
            field,
            referent_set,
            current: RwLock::new(None),
        }
    }

    /// The referents, if they have been loaded this session.
    #[must_use]
    pub fn current_value(&self) -> Option<Vec<Arc<R>>> {
        self.current.read().clone()
    }

    /// True if the referents are already loaded, or no identity sequence
    /// is stored.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some() || self.owner.navigation().collection(self.field).is_none()
    }

    /// Reads the stored identity sequence, fetches every referent in one
    /// batched query, and assigns the result. A no-op returning `None` if
    /// no sequence is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying find fails.
    pub async fn load(&self) -> Result<Option<Vec<Arc<R>>>> {
        let Some(ids) = self.owner.navigation().collection(self.field) else {
            return Ok(None);
        };
        if ids.is_empty() {
            *self.current.write() = Some(Vec::new());
            return Ok(Some(Vec::new()));
        }
        let filter = doc! { "_id": { "$in": ids_to_bson(&ids) } };
        let referents = self.referent_set.find_many(filter).await?;
        self.owner
            .set_collection_reference(self.field, referents.iter().map(|r| r.id()).collect());
        *self.current.write() = Some(referents.clone());
        Ok(Some(referents))
    }
}

fn ids_to_bson(ids: &[ObjectId]) -> Vec<bson::Bson> {
    ids.iter().copied().map(bson::Bson::from).collect()
}

/// A view over a single scalar or complex property, typed as `V` at the
/// call site.
pub struct PropertyEntry<T, V>
where
    T: DocumentFields,
{
    owner: Arc<T>,
    field: &'static str,
    _marker: PhantomData<V>,
}

impl<T, V> PropertyEntry<T, V>
where
    T: DocumentFields,
    V: Serialize + DeserializeOwned,
{
    /// Builds a handle over `owner`'s `field` scalar/complex property.
    #[must_use]
    pub fn new(owner: Arc<T>, field: &'static str) -> Self {
        Self {
            owner,
            field,
            _marker: PhantomData,
        }
    }

    /// The property's current value, or `None` if the field is unknown or
    /// cannot be decoded as `V`.
    #[must_use]
    pub fn current_value(&self) -> Option<V> {
        self.owner.get_field_bson(self.field).and_then(|raw| bson::from_bson(raw).ok())
    }

    /// Writes `value` through the document's controlled setter.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be encoded as BSON, or if the
    /// document rejects the field name.
    pub fn set_current_value(&self, value: V) -> std::result::Result<(), CoreError> {
        let raw = bson::to_bson(&value).map_err(|e| CoreError::ArgumentError(e.to_string()))?;
        self.owner.set_field_bson(self.field, raw)
    }
}
