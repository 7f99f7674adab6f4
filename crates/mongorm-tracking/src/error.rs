use thiserror::Error;

/// Error conditions raised by the state manager and cache cleaner.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// A caller-supplied argument was invalid.
    #[error("invalid argument: {0}")]
    ArgumentError(String),

    /// An operation was attempted against an entry that cannot support it in
    /// its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Convenience alias for `Result<T, TrackingError>`.
pub type Result<T> = std::result::Result<T, TrackingError>;
