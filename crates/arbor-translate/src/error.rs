//! Error types for the translation engine.

use arbor_types::{Path, TypeError};
use thiserror::Error;

/// Errors raised while building translators.
///
/// These surface when the registry is built at startup, never during a
/// per-record save or load.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No factory in the chain accepts the declared type.
    #[error("no translator for type {ty} at '{path}'")]
    NoTranslator { ty: String, path: Path },

    /// A field refers to a class that was never registered.
    #[error("unknown class '{class}' referenced at '{path}'")]
    UnknownClass { class: String, path: Path },

    /// A class with this name is already registered.
    #[error("class '{0}' is already registered")]
    DuplicateClass(String),

    /// Repetition nested inside repetition, which the store cannot hold.
    #[error("illegal nesting at '{path}': {reason}")]
    IllegalNesting { path: Path, reason: String },

    /// An embedded class contains itself without indirection.
    #[error("class '{class}' embeds itself at '{path}'")]
    RecursiveEmbedding { class: String, path: Path },

    /// Field metadata is malformed.
    #[error("invalid field '{class}.{field}': {reason}")]
    InvalidField {
        class: String,
        field: String,
        reason: String,
    },

    /// A condition cannot be applied to the field it is attached to.
    #[error("invalid condition on '{class}.{field}': {reason}")]
    InvalidCondition {
        class: String,
        field: String,
        reason: String,
    },

    /// Map keys of this type have no stringifier.
    #[error("no stringifier for map keys of type {ty} at '{path}'")]
    NoStringifier { ty: String, path: Path },

    /// Registration attempted after the registry was frozen.
    #[error("registry is frozen: registration must happen before the first session")]
    Frozen,
}

/// Errors raised while saving or loading a record.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// A value has the wrong shape for the declared type.
    #[error("at '{path}': expected {expected}, found {found}")]
    Conversion {
        path: Path,
        expected: String,
        found: String,
    },

    /// A value converts to the declared type but does not fit in it.
    #[error("at '{path}': {value} is out of range for {target}")]
    OutOfRange {
        path: Path,
        value: String,
        target: String,
    },

    /// An enum constant name is not one of the declared variants.
    #[error("at '{path}': '{name}' is not a variant of {enum_name}")]
    UnknownVariant {
        path: Path,
        name: String,
        enum_name: String,
    },

    /// The property tree does not have the structure the translator needs.
    #[error("at '{path}': {reason}")]
    Shape { path: Path, reason: String },

    /// No entity class is registered for this kind.
    #[error("unknown entity kind '{0}'")]
    UnknownKind(String),

    /// The object cannot be handled as an entity of its class.
    #[error("invalid {class} entity: {reason}")]
    InvalidEntity { class: String, reason: String },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TranslateError {
    pub fn conversion(path: &Path, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.clone(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn shape(path: &Path, reason: impl Into<String>) -> Self {
        Self::Shape {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// The path of the offending field, for field-scoped errors.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Conversion { path, .. }
            | Self::OutOfRange { path, .. }
            | Self::UnknownVariant { path, .. }
            | Self::Shape { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Field-scoped conversion failure that a lenient field may recover from.
    pub fn is_conversion(&self) -> bool {
        self.path().is_some()
    }
}

/// Result alias for save/load operations.
pub type TranslateResult<T> = Result<T, TranslateError>;

/// Result alias for translator construction.
pub type ConfigResult<T> = Result<T, ConfigError>;
