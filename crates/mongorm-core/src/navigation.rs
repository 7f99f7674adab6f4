//! Unresolved navigation-property storage.
//!
//! A [`Document`](crate::Document) never stores materialized referents for
//! its reference-typed fields; it stores raw identities in a
//! [`NavigationMap`] and resolves them on demand through an entry handle's
//! `load()`. This is what lets the serializer (`mongorm-serde`) write
//! references without walking the referenced document's own fields.

use std::collections::HashMap;

use bson::oid::ObjectId;

/// The unresolved identity payload behind a navigation property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationValue {
    /// A single-reference navigation property; holds the referent's
    /// identity, or the empty identity if unset.
    Single(ObjectId),
    /// A collection-reference navigation property; holds the ordered
    /// identities of every referent.
    Collection(Vec<ObjectId>),
}

impl NavigationValue {
    /// Returns the single identity, if this is a [`NavigationValue::Single`].
    #[must_use]
    pub fn as_single(&self) -> Option<ObjectId> {
        match self {
            Self::Single(id) => Some(*id),
            Self::Collection(_) => None,
        }
    }

    /// Returns the identity sequence, if this is a
    /// [`NavigationValue::Collection`].
    #[must_use]
    pub fn as_collection(&self) -> Option<&[ObjectId]> {
        match self {
            Self::Collection(ids) => Some(ids),
            Self::Single(_) => None,
        }
    }
}

/// Per-document storage of unresolved navigation-property identities, keyed
/// by field name.
#[derive(Debug, Clone, Default)]
pub struct NavigationMap {
    values: HashMap<&'static str, NavigationValue>,
}

impl NavigationMap {
    /// An empty navigation map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the raw identity stored for a single-reference property.
    #[must_use]
    pub fn single(&self, field: &'static str) -> Option<ObjectId> {
        self.values.get(field).and_then(NavigationValue::as_single)
    }

    /// Reads the raw identity sequence stored for a collection-reference
    /// property.
    #[must_use]
    pub fn collection(&self, field: &'static str) -> Option<&[ObjectId]> {
        self.values.get(field).and_then(NavigationValue::as_collection)
    }

    /// Sets the raw identity for a single-reference property.
    pub fn set_single(&mut self, field: &'static str, id: ObjectId) {
        self.values.insert(field, NavigationValue::Single(id));
    }

    /// Sets the raw identity sequence for a collection-reference property.
    pub fn set_collection(&mut self, field: &'static str, ids: Vec<ObjectId>) {
        self.values.insert(field, NavigationValue::Collection(ids));
    }

    /// Iterates over every stored navigation field, in insertion order is
    /// not guaranteed (backed by a hash map); callers that need the
    /// declaration order should consult the document's own field list.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &NavigationValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::empty_id;

    #[test]
    fn single_round_trips() {
        let mut nav = NavigationMap::new();
        let id = ObjectId::new();
        nav.set_single("parent", id);
        assert_eq!(nav.single("parent"), Some(id));
        assert_eq!(nav.collection("parent"), None);
    }

    #[test]
    fn collection_round_trips() {
        let mut nav = NavigationMap::new();
        let ids = vec![ObjectId::new(), ObjectId::new()];
        nav.set_collection("items", ids.clone());
        assert_eq!(nav.collection("items"), Some(ids.as_slice()));
    }

    #[test]
    fn unset_single_is_absent() {
        let nav = NavigationMap::new();
        assert_eq!(nav.single("parent"), None);
    }

    #[test]
    fn empty_id_is_a_valid_sentinel_value() {
        let mut nav = NavigationMap::new();
        nav.set_single("parent", empty_id());
        assert_eq!(nav.single("parent"), Some(empty_id()));
    }
}
