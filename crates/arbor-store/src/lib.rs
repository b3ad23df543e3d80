//! Remote store interface for Arbor.
//!
//! The remote store holds records as property trees addressed by [`Key`].
//! Its wire protocol, queries, and transactions are outside Arbor; this
//! crate only defines the boundary the session and cache layers consume.
//!
//! # Storage Backends
//!
//! All backends implement the async [`RemoteStore`] trait:
//!
//! - [`InMemoryRemoteStore`] -- `BTreeMap`-based store for tests and
//!   embedding, with round-trip counters
//!
//! # Design Rules
//!
//! 1. Not-found is `Ok(None)`, never an error.
//! 2. Trees are checked against [`arbor_tree::Limits`] before they are
//!    accepted; oversized writes are rejected, not truncated.
//! 3. Batch operations give no atomicity across keys.
//!
//! [`Key`]: arbor_types::Key

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRemoteStore;
pub use traits::RemoteStore;
