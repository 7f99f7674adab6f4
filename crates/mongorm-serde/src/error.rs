//! Errors raised while encoding or decoding a tracked document.

use thiserror::Error;

/// Failures from [`crate::encode`] and [`crate::decode`].
#[derive(Debug, Error)]
pub enum SerdeError {
    /// A raw BSON record had no `_id` field, or it was not an `ObjectId`.
    #[error("document record is missing a valid _id field")]
    MissingIdentity,
    /// [`mongorm_core::DocumentFields::set_field_bson`] rejected a field
    /// name or value while hydrating a document.
    #[error("failed to hydrate field {field:?}: {source}")]
    FieldHydration {
        /// The field name that could not be written.
        field: String,
        /// The underlying rejection.
        #[source]
        source: mongorm_core::CoreError,
    },
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, SerdeError>;
