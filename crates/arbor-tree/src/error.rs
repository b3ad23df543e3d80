/// Errors from property tree operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TreeError {
    /// A structural limit of the remote store would be exceeded.
    #[error("limit exceeded at '{path}': {limit} is {actual}, maximum is {max}")]
    LimitExceeded {
        path: String,
        limit: &'static str,
        actual: usize,
        max: usize,
    },

    /// Encoding or decoding a tree failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
