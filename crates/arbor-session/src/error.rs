use arbor_store::StoreError;
use arbor_translate::TranslateError;
use arbor_tree::TreeError;
use arbor_types::{Key, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("translation error: {0}")]
    Translate(#[from] TranslateError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The tree exceeds the store's structural limits. Raised before the
    /// store is contacted.
    #[error("write rejected: {0}")]
    Limit(#[from] TreeError),

    #[error("invalid key: {0}")]
    Key(#[from] TypeError),

    #[error("key {key} is not a {expected}")]
    KindMismatch { key: Key, expected: String },

    /// The identity cache holds a different Rust type for this key.
    #[error("entity at {key} is not a {expected}")]
    TypeMismatch { key: Key, expected: &'static str },

    /// Only from [`crate::Ref::require`]; lookups report absence as `None`.
    #[error("no entity at {0}")]
    NotFound(Key),

    /// A live reference outlived its session.
    #[error("session for {0} is closed")]
    Closed(Key),

    /// An application type rejected the loaded object.
    #[error("cannot build {kind} from stored object: {reason}")]
    Entity { kind: String, reason: String },
}

impl SessionError {
    pub fn entity(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Entity {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
