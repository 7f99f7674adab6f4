//! Field-level access for serialization and reference loading.
//!
//! [`Document`] alone is enough for identity and navigation bookkeeping, but
//! the serializer (`mongorm-serde`) also needs to read and write individual
//! scalar/complex fields by name, and reference entries
//! (`mongorm::entries`) need to assign a resolved referent back into a
//! single-reference property. [`DocumentFields`] covers both: its setters
//! take `&self`, not `&mut self`, because a tracked document is shared as
//! `Arc<T>` across every handle that observes it — fields generated by
//! `#[derive(mongorm_macros::Document)]` are stored behind interior
//! mutability (typically `parking_lot::RwLock<Field>`), and the setter
//! calls `self.change_notifier().notify(name)` itself after writing.

use bson::Bson;

use crate::document::Document;
use crate::error::CoreError;

/// Per-field read/write access to a tracked document's controlled
/// properties, keyed by declaration name.
pub trait DocumentFields: Document {
    /// Overwrites the named field from a raw BSON value. Used during
    /// deserialization (tracking is suppressed for the duration) and by
    /// reference-entry `load()` (tracking is active, so this also reports
    /// a change).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArgumentError`] if `name` does not name a
    /// scalar/complex field on this type.
    fn set_field_bson(&self, name: &str, value: Bson) -> Result<(), CoreError>;

    /// Reads the named field's current value as BSON, for serialization.
    /// Returns `None` if `name` does not name a scalar/complex field.
    fn get_field_bson(&self, name: &str) -> Option<Bson>;

    /// Declaration-order names of every scalar/complex field.
    fn field_names() -> &'static [&'static str]
    where
        Self: Sized;

    /// Declaration-order names of every single-reference navigation
    /// property.
    fn single_reference_names() -> &'static [&'static str]
    where
        Self: Sized;

    /// Declaration-order names of every collection-reference navigation
    /// property.
    fn collection_reference_names() -> &'static [&'static str]
    where
        Self: Sized;
}
