use thiserror::Error;

/// Error conditions raised directly by the tracking core, independent of
/// any particular persistence backend.
///
/// Other mongorm crates define their own error enums for concerns specific
/// to them (bulk write correlation lives in `mongorm_wire::error`,
/// concurrent-find rejection in `mongorm::error`) and wrap `CoreError` with
/// `#[from]` where it can occur.
///
/// # Examples
///
/// ```
/// use mongorm_core::error::CoreError;
///
/// fn require_non_empty(name: &str) -> Result<(), CoreError> {
///     if name.is_empty() {
///         return Err(CoreError::ArgumentError("name must not be empty".into()));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum CoreError {
    /// A caller-supplied argument was null, empty, or out of range. Raised
    /// synchronously, before any store interaction.
    #[error("invalid argument: {0}")]
    ArgumentError(String),

    /// An operation was attempted against an entry that cannot support it in
    /// its current state (for example, reloading a Detached entry).
    #[error("invalid state for entry {id}: {reason}")]
    InvalidState {
        /// The identity of the offending entry, formatted as hex.
        id: String,
        /// What was wrong.
        reason: String,
    },
}

/// Convenience alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_error_display() {
        let err = CoreError::ArgumentError("name must not be empty".into());
        assert_eq!(err.to_string(), "invalid argument: name must not be empty");
    }

    #[test]
    fn invalid_state_display() {
        let err = CoreError::InvalidState {
            id: "abc123".into(),
            reason: "entry is detached".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid state for entry abc123: entry is detached"
        );
    }
}
