//! The [`Document`] contract.

use bson::oid::ObjectId;

use crate::change::ChangeNotifier;
use crate::navigation::NavigationMap;

/// The behavioral surface the state manager, cache, and serializer need from
/// a tracked type.
///
/// Implementations are normally generated by
/// `#[derive(mongorm_macros::Document)]` rather than written by hand: the
/// derive emits the identity and navigation storage (behind interior
/// mutability — a tracked instance is shared as `Arc<T>` across every
/// handle that observes it, so these methods take `&self`), a
/// `ChangeNotifier` field, and setter forwarders for every field marked
/// `#[mongorm(tracked)]`.
pub trait Document: Send + Sync + 'static {
    /// The name of the backing collection. Defaults apply: the source spec
    /// uses the type's own name, which is what the derive macro emits
    /// unless overridden with `#[mongorm(collection = "...")]`.
    fn collection_name() -> &'static str
    where
        Self: Sized;

    /// The document's identity.
    fn id(&self) -> ObjectId;

    /// Overwrites the document's identity. Used by `addOrGetExisting` when
    /// constructing a brand-new instance during deserialization, and by
    /// `DocumentSet::add` to assign a freshly generated identity.
    fn set_id(&self, id: ObjectId);

    /// A snapshot of the document's unresolved navigation-property
    /// identities.
    fn navigation(&self) -> NavigationMap;

    /// Sets the raw identity behind a single-reference navigation property.
    /// Called by a loaded reference entry after it resolves and assigns the
    /// referent.
    fn set_single_reference(&self, field: &'static str, id: ObjectId);

    /// Sets the raw identity sequence behind a collection-reference
    /// navigation property. Called by a loaded collection entry after it
    /// resolves and assigns the referents.
    fn set_collection_reference(&self, field: &'static str, ids: Vec<ObjectId>);

    /// The slot through which controlled-property writes are reported to
    /// whatever state manager currently tracks this instance.
    fn change_notifier(&self) -> &ChangeNotifier;
}
