/// Errors from cache operations.
///
/// A miss is not an error, and neither is a lost compare-and-swap: that is
/// reported as [`crate::CasOutcome::Conflict`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache backend cannot be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A cached value could not be encoded or decoded.
    #[error("cache codec error for '{key}': {reason}")]
    Codec { key: String, reason: String },
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
