//! Identity values.
//!
//! mongorm reuses [`bson::oid::ObjectId`] directly as the tracked identity
//! type: it is already a 12-byte, chronologically-ordered value, which is
//! exactly what the state manager needs as a map key.

use bson::oid::ObjectId;

/// The distinguished empty identity (all-zero bytes).
///
/// Used as the "no referent" sentinel for single-reference navigation
/// properties that have not been set.
#[must_use]
pub fn empty_id() -> ObjectId {
    ObjectId::from_bytes([0u8; 12])
}

/// Returns true if `id` is the distinguished empty identity.
#[must_use]
pub fn is_empty_id(id: ObjectId) -> bool {
    id == empty_id()
}
