use arbor_tree::TreeError;

/// Errors from remote store operations.
///
/// A key that does not exist is not an error: reads return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The store refused a tree that exceeds its structural limits.
    #[error("write rejected: {0}")]
    Limit(#[from] TreeError),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
