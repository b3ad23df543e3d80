use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("truncated key encoding: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown key id tag 0x{0:02x}")]
    UnknownIdTag(u8),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
