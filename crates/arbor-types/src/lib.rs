//! Foundation types for Arbor.
//!
//! This crate provides the identity, navigation, and value types used
//! throughout the Arbor entity-mapping layer. Every other Arbor crate depends
//! on `arbor-types`.
//!
//! # Key Types
//!
//! - [`Key`] -- Hierarchical entity address (parent chain + kind + id-or-name)
//! - [`KeyId`] -- Numeric id or string name of a single key element
//! - [`Path`] -- Immutable dot-separated navigation address used in errors
//!   and condition evaluation
//! - [`Value`] / [`Object`] -- Application-side typed value graph that the
//!   translators convert to and from property trees

pub mod error;
pub mod key;
pub mod path;
pub mod value;

pub use error::{TypeError, TypeResult};
pub use key::{Key, KeyId};
pub use path::{Path, Segment};
pub use value::{Object, Value};
