//! Sessions for Arbor.
//!
//! A [`Session`] scopes one logical operation: it turns typed application
//! entities into property trees through the frozen
//! [`Registry`](arbor_translate::Registry), talks to the remote store (or a
//! caching store in front of it), and remembers every key it has seen.
//!
//! # Key Types
//!
//! - [`Entity`] -- an application type with a kind and an object mapping
//! - [`Session`] -- load, save and delete with a per-operation identity cache
//! - [`Ref`] -- lazy key-addressed handle, dead or live
//! - [`LoadScope`] -- context handed to [`Entity::from_object`]
//!
//! # Design Rules
//!
//! 1. Within a session a key resolves at most once; later reads return the
//!    same `Arc`, including a remembered absence.
//! 2. A live `Ref` resolves on its first `get` and memoizes the result.
//! 3. Structural limits are checked before the store is contacted.
//! 4. Not-found is `Ok(None)`.

pub mod entity;
pub mod error;
pub mod reference;
pub mod session;

pub use entity::Entity;
pub use error::{SessionError, SessionResult};
pub use reference::Ref;
pub use session::{LoadScope, Session};
