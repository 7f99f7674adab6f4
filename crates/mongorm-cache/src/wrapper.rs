//! [`DocumentWrapper`]: a handle over a tracked document that is either
//! strongly owned, weakly observed, or a null sentinel.

use std::sync::{Arc, Weak};

use bson::oid::ObjectId;
use mongorm_core::Document;

/// A handle holding one document together with its identity and collection
/// name, in one of three forms.
///
/// Identity and collection name are cached at construction time so they
/// remain readable through a [`DocumentWrapper::Weak`] or
/// [`DocumentWrapper::Null`] handle even after the underlying document has
/// been reclaimed — the state manager needs to keep answering "which
/// document was this?" for a dead entry right up until it is flushed from
/// the cache.
pub enum DocumentWrapper<T: Document> {
    /// Owns the document for the wrapper's lifetime. Used for Added,
    /// Modified, and Deleted entries.
    Strong(Arc<T>),
    /// Holds the document only as long as some other strong owner exists.
    /// Used for Unchanged entries.
    Weak {
        /// The weak handle itself.
        weak: Weak<T>,
        /// The identity, cached so it survives reclamation.
        id: ObjectId,
        /// The collection name, cached so it survives reclamation.
        collection: &'static str,
    },
    /// A sentinel standing in for a missing document. Always reports
    /// absence.
    Null {
        /// The identity the sentinel was constructed for.
        id: ObjectId,
        /// The collection name the sentinel was constructed for.
        collection: &'static str,
    },
}

impl<T: Document> DocumentWrapper<T> {
    /// Wraps `doc` strongly: the wrapper itself keeps it alive.
    pub fn strong(doc: Arc<T>) -> Self {
        Self::Strong(doc)
    }

    /// Wraps `doc` weakly: the wrapper observes it without extending its
    /// lifetime.
    pub fn weak(doc: &Arc<T>) -> Self {
        Self::Weak {
            weak: Arc::downgrade(doc),
            id: doc.id(),
            collection: T::collection_name(),
        }
    }

    /// A sentinel for a missing document at `id`.
    pub fn null(id: ObjectId) -> Self {
        Self::Null {
            id,
            collection: T::collection_name(),
        }
    }

    /// Converts this wrapper into its weak form, preserving identity and
    /// collection name. Used when an entry transitions away from a strongly
    /// held state (Added/Modified/Deleted) into Unchanged.
    #[must_use]
    pub fn into_weak(self) -> Self {
        match self {
            Self::Strong(doc) => Self::weak(&doc),
            weak_or_null => weak_or_null,
        }
    }

    /// Returns the document if it is still reachable.
    pub fn document(&self) -> Option<Arc<T>> {
        match self {
            Self::Strong(doc) => Some(Arc::clone(doc)),
            Self::Weak { weak, .. } => weak.upgrade(),
            Self::Null { .. } => None,
        }
    }

    /// The wrapper's identity, readable regardless of liveness.
    pub fn identity(&self) -> ObjectId {
        match self {
            Self::Strong(doc) => doc.id(),
            Self::Weak { id, .. } | Self::Null { id, .. } => *id,
        }
    }

    /// The wrapper's collection name, readable regardless of liveness.
    pub fn collection_name(&self) -> &'static str {
        match self {
            Self::Strong(_) => T::collection_name(),
            Self::Weak { collection, .. } | Self::Null { collection, .. } => collection,
        }
    }

    /// Whether the document is currently reachable through this wrapper.
    pub fn is_alive(&self) -> bool {
        !matches!(self, Self::Null { .. }) && self.document().is_some()
    }
}

impl<T: Document> Clone for DocumentWrapper<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Strong(doc) => Self::Strong(Arc::clone(doc)),
            Self::Weak { weak, id, collection } => Self::Weak {
                weak: Weak::clone(weak),
                id: *id,
                collection,
            },
            Self::Null { id, collection } => Self::Null { id: *id, collection },
        }
    }
}

impl<T: Document> std::fmt::Debug for DocumentWrapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWrapper")
            .field("id", &self.identity())
            .field("collection", &self.collection_name())
            .field("alive", &self.is_alive())
            .finish()
    }
}
