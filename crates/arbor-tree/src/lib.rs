//! Property trees for Arbor.
//!
//! A property tree is the generic, store-agnostic representation of a record
//! as it is physically sent to and received from the remote store. The
//! translators build trees on save and walk them on load.
//!
//! # Node Types
//!
//! - [`MapNode`] -- named children plus an optional scalar value at this
//!   exact path and an index flag for that value
//! - [`ListNode`] -- ordered sequence of map-nodes (never nested lists)
//! - [`Node`] -- either of the above
//! - [`PropertyValue`] -- the scalar values the store understands
//!
//! # Design Rules
//!
//! 1. A path can be both a leaf value and a parent of deeper paths: a
//!    map-node's scalar value is independent of its children.
//! 2. The scalar value's index flag only matters on save; loads ignore it.
//! 3. A list-node's items are always map-nodes. Nested repetition is
//!    expressed by flattening into parallel sibling lists.
//! 4. [`Limits`] are checked before a tree is handed to the store; an
//!    oversized tree is rejected, never truncated.

pub mod error;
pub mod limits;
pub mod node;
pub mod property;

pub use error::{TreeError, TreeResult};
pub use limits::Limits;
pub use node::{FlatProperty, ListNode, MapNode, Node};
pub use property::PropertyValue;
