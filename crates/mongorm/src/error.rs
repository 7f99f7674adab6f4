//! The top-level error type returned by [`crate::RepositoryContext`]
//! operations, aggregating every internal crate's error type.

use thiserror::Error;

/// Errors surfaced by the public façade.
#[derive(Debug, Error)]
pub enum MongormError {
    /// An argument was invalid, or the context/entry was in the wrong
    /// state for the requested operation.
    #[error("{0}")]
    Config(String),
    /// Propagated from `mongorm-core`.
    #[error(transparent)]
    Core(#[from] mongorm_core::CoreError),
    /// Propagated from `mongorm-tracking`.
    #[error(transparent)]
    Tracking(#[from] mongorm_tracking::TrackingError),
    /// Propagated from `mongorm-serde`.
    #[error(transparent)]
    Serde(#[from] mongorm_serde::SerdeError),
    /// Propagated from `mongorm-wire`.
    #[error(transparent)]
    Wire(#[from] mongorm_wire::WireError),
    /// The driver itself failed outside of a wire-command context (e.g.
    /// opening the initial connection).
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    /// `reload` was called concurrently with another `reload` or save of
    /// the same entry and lost the race; documented as "last writer wins"
    /// in `RepositoryContext::reload`, surfaced here only when the entry
    /// was removed out from under the reload (e.g. concurrently deleted).
    #[error("concurrent find: entry for identity {0} vanished mid-reload")]
    ConcurrentFind(bson::oid::ObjectId),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, MongormError>;
