//! Translation engine for Arbor.
//!
//! Converts application values to and from property trees, driven by a
//! metadata table that is supplied up front and frozen into a [`Registry`].
//!
//! # Key Types
//!
//! - [`ClassMeta`] / [`FieldMeta`] / [`TypeDesc`] -- the metadata table
//! - [`Condition`] -- save-time index/skip predicates
//! - [`Translator`] / [`TranslatorFactory`] -- pluggable converters
//! - [`FactoryChain`] -- ordered factories, user factories first
//! - [`Stringifier`] -- map keys to and from child names
//! - [`RegistryBuilder`] / [`Registry`] -- open for registration, then frozen
//!
//! # Design Rules
//!
//! 1. All translators are created when the registry is built. A declared
//!    type no factory handles is a [`ConfigError`] at startup, never at
//!    save or load time.
//! 2. Conversion errors carry the [`arbor_types::Path`] of the offending
//!    field. Strict fields abort the record; lenient fields recover.
//! 3. Collections of embedded objects are flattened into index-aligned leaf
//!    lists plus a `^null` marker list that defines the length.
//! 4. Repetition nested inside repetition is rejected at registration.
//! 5. Unknown paths in a stored tree are ignored on load.

pub mod chain;
pub mod collection;
pub mod condition;
pub mod context;
pub mod embedded;
pub mod entity;
pub mod error;
pub mod map;
pub mod meta;
pub mod registry;
pub mod scalar;
pub mod stringifier;
pub mod translator;

pub use chain::FactoryChain;
pub use collection::{NULL_MARKER, PRESENT_MARKER};
pub use condition::{
    Always, Condition, IfDefault, IfEmpty, IfFalse, IfNotDefault, IfNotEmpty, IfNotNull,
    IfNotZero, IfNull, IfTrue, IfZero, Not,
};
pub use context::{CreateContext, LoadContext, SaveContext};
pub use embedded::ClassTranslator;
pub use entity::{EntityTranslator, SavedEntity};
pub use error::{ConfigError, ConfigResult, TranslateError, TranslateResult};
pub use meta::{
    Annotations, ClassMeta, EntityIdentity, EnumDesc, FieldMeta, FloatKind, IdType, IndexPolicy,
    IntKind, LoadPolicy, TypeDesc, STRINGIFIER_ANNOTATION,
};
pub use registry::{Registry, RegistryBuilder};
pub use stringifier::Stringifier;
pub use translator::{Translator, TranslatorFactory};
