//! Errors from issuing bulk commands against the underlying store.

use thiserror::Error;

/// Failures surfaced while building or issuing a bulk command.
#[derive(Debug, Error)]
pub enum WireError {
    /// The driver itself failed (connection, timeout, server error not
    /// expressed as a per-document write error).
    #[error("database command failed: {0}")]
    Driver(#[from] mongodb::error::Error),
    /// A batch was empty; there is nothing to send.
    #[error("cannot issue a bulk command with zero documents")]
    EmptyBatch,
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, WireError>;
