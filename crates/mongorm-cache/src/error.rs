use thiserror::Error;

/// Error conditions raised by the document cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A caller-supplied argument was invalid (for example, a negative
    /// `flush` budget).
    #[error("invalid argument: {0}")]
    ArgumentError(String),
}

/// Convenience alias for `Result<T, CacheError>`.
pub type Result<T> = std::result::Result<T, CacheError>;
