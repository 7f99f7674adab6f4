//! Identity-preserving encode/decode between a tracked document and its
//! BSON wire record.
//!
//! Encoding is a straightforward field walk. Decoding is the critical path:
//! it must never construct a second in-memory instance for an identity that
//! is already tracked, since the weak/strong cache and the change-tracking
//! machinery both assume at most one live instance per identity.

use std::sync::Arc;

use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};
use mongorm_core::{Document, DocumentFields, empty_id};
use mongorm_tracking::{EntryState, StateManager};

use crate::error::{Result, SerdeError};

/// Writes `doc` as a self-describing BSON record: identity, then every
/// scalar/complex field in declaration order, then every single-reference
/// navigation property (as its referent's raw identity, or the empty
/// identity if unset), then every collection-reference navigation property
/// (as an array of raw identities).
pub fn encode<T: DocumentFields>(doc: &T) -> BsonDocument {
    let mut record = BsonDocument::new();
    record.insert("_id", doc.id());

    for &field in T::field_names() {
        if let Some(value) = doc.get_field_bson(field) {
            record.insert(field, value);
        }
    }

    let nav = doc.navigation();
    for &field in T::single_reference_names() {
        let id = nav.single(field).unwrap_or_else(empty_id);
        record.insert(field, id);
    }
    for &field in T::collection_reference_names() {
        let ids = nav.collection(field).unwrap_or_default();
        let array: Vec<Bson> = ids.into_iter().map(Bson::from).collect();
        record.insert(field, array);
    }

    record
}

/// Decodes `raw` through the identity-preserving path:
///
/// 1. Reads `_id`.
/// 2. Asks `manager` for the already-tracked instance at that identity
///    (`beforeDeserialize`); constructs a fresh `T::default()` and assigns
///    its identity if none is tracked yet.
/// 3. Suppresses property-change tracking for the identity, so hydration
///    writes do not spuriously promote an Unchanged entry to Modified.
/// 4. Assigns every scalar/complex field through the controlled setter, and
///    stashes single/collection-reference identities directly into the
///    navigation map without resolving them.
/// 5. Re-enables tracking.
/// 6. Adds-or-gets the entry and transitions it to Unchanged
///    (`afterDeserialize`).
///
/// Every concurrent read of the same identity that goes through this path
/// observes the same `Arc<T>`.
pub fn decode<T: DocumentFields + Default>(raw: &BsonDocument, manager: &Arc<StateManager<T>>) -> Result<Arc<T>> {
    let id = raw.get_object_id("_id").map_err(|_| SerdeError::MissingIdentity)?;

    let doc = match manager.find(&id).and_then(|entry| entry.document()) {
        Some(existing) => existing,
        None => {
            let fresh = Arc::new(T::default());
            fresh.set_id(id);
            fresh
        }
    };

    manager.set_document_property_tracking(id, false);
    hydrate(&*doc, raw);
    manager.set_document_property_tracking(id, true);

    let entry = manager.add_or_get_existing(Arc::clone(&doc), EntryState::Unchanged);
    if entry.state() != EntryState::Unchanged {
        manager.change_document_state(&entry, EntryState::Unchanged);
    }

    Ok(doc)
}

fn hydrate<T: DocumentFields>(doc: &T, raw: &BsonDocument) {
    for &field in T::field_names() {
        if let Some(value) = raw.get(field) {
            if let Err(err) = doc.set_field_bson(field, value.clone()) {
                tracing::warn!(field, error = %err, "skipping field during hydration");
            }
        }
    }
    for &field in T::single_reference_names() {
        if let Some(id) = raw.get_object_id(field).ok().filter(|id| *id != empty_id()) {
            doc.set_single_reference(field, id);
        }
    }
    for &field in T::collection_reference_names() {
        if let Ok(array) = raw.get_array(field) {
            let ids: Vec<ObjectId> = array.iter().filter_map(Bson::as_object_id).collect();
            doc.set_collection_reference(field, ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use mongorm_core::{ChangeNotifier, NavigationMap};
    use parking_lot::RwLock;

    #[derive(Default)]
    struct Widget {
        id: RwLock<ObjectId>,
        name: RwLock<String>,
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
        fn set_field_bson(&self, name: &str, value: Bson) -> std::result::Result<(), mongorm_core::CoreError> {
            match name {
                "name" => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| mongorm_core::CoreError::ArgumentError("name must be a string".into()))?;
                    *self.name.write() = s.to_string();
                    self.notifier.notify("name");
                    Ok(())
                }
                other => Err(mongorm_core::CoreError::ArgumentError(format!("unknown field {other}"))),
            }
        }

        fn get_field_bson(&self, name: &str) -> Option<Bson> {
            match name {
                "name" => Some(Bson::String(self.name.read().clone())),
                _ => None,
            }
        }

        fn field_names() -> &'static [&'static str] {
            &["name"]
        }
        fn single_reference_names() -> &'static [&'static str] {
            &["owner"]
        }
        fn collection_reference_names() -> &'static [&'static str] {
            &["tags"]
        }
    }

    fn widget(name: &str) -> Arc<Widget> {
        Arc::new(Widget {
            id: RwLock::new(ObjectId::new()),
            name: RwLock::new(name.to_string()),
            nav: RwLock::new(NavigationMap::new()),
            notifier: ChangeNotifier::new(),
        })
    }

    #[test]
    fn encode_writes_identity_fields_and_references() {
        let doc = widget("gizmo");
        let owner = ObjectId::new();
        doc.set_single_reference("owner", owner);
        let tag_ids = vec![ObjectId::new(), ObjectId::new()];
        doc.set_collection_reference("tags", tag_ids.clone());

        let record = encode(&*doc);
        assert_eq!(record.get_object_id("_id").unwrap(), doc.id());
        assert_eq!(record.get_str("name").unwrap(), "gizmo");
        assert_eq!(record.get_object_id("owner").unwrap(), owner);
        let decoded_tags: Vec<ObjectId> = record
            .get_array("tags")
            .unwrap()
            .iter()
            .filter_map(Bson::as_object_id)
            .collect();
        assert_eq!(decoded_tags, tag_ids);
    }

    #[test]
    fn encode_writes_empty_identity_for_unset_single_reference() {
        let doc = widget("gizmo");
        let record = encode(&*doc);
        assert_eq!(record.get_object_id("owner").unwrap(), empty_id());
    }

    #[test]
    fn decode_constructs_fresh_instance_when_untracked() {
        let manager = StateManager::<Widget>::new();
        let id = ObjectId::new();
        let mut raw = BsonDocument::new();
        raw.insert("_id", id);
        raw.insert("name", "hydrated");

        let decoded = decode(&raw, &manager).unwrap();
        assert_eq!(decoded.id(), id);
        assert_eq!(&*decoded.name.read(), "hydrated");

        let entry = manager.find(&id).expect("entry should be tracked");
        assert_eq!(entry.state(), mongorm_tracking::EntryState::Unchanged);
    }

    #[test]
    fn decode_reuses_the_already_tracked_instance() {
        let manager = StateManager::<Widget>::new();
        let doc = widget("original");
        let id = doc.id();
        manager.add_or_get_existing(Arc::clone(&doc), mongorm_tracking::EntryState::Unchanged);

        let mut raw = BsonDocument::new();
        raw.insert("_id", id);
        raw.insert("name", "updated");

        let decoded = decode(&raw, &manager).unwrap();
        assert!(Arc::ptr_eq(&decoded, &doc));
        assert_eq!(&*doc.name.read(), "updated");
    }

    #[test]
    fn decode_does_not_promote_unchanged_entry_to_modified() {
        let manager = StateManager::<Widget>::new();
        let doc = widget("original");
        let id = doc.id();
        manager.add_or_get_existing(Arc::clone(&doc), mongorm_tracking::EntryState::Unchanged);

        let mut raw = BsonDocument::new();
        raw.insert("_id", id);
        raw.insert("name", "updated");
        decode(&raw, &manager).unwrap();

        let entry = manager.find(&id).unwrap();
        assert_eq!(entry.state(), mongorm_tracking::EntryState::Unchanged);
    }

    #[test]
    fn decode_rejects_a_record_with_no_identity() {
        let manager = StateManager::<Widget>::new();
        let raw = BsonDocument::new();
        assert!(matches!(decode(&raw, &manager), Err(SerdeError::MissingIdentity)));
    }
}
