//! Entity cache for Arbor.
//!
//! Sits in front of a [`RemoteStore`](arbor_store::RemoteStore) and keeps
//! encoded property trees in a byte-valued cache service, including
//! negative entries for keys the store confirmed absent.
//!
//! # Key Types
//!
//! - [`CacheService`] -- byte cache with compare-and-swap tokens
//! - [`EntityCache`] -- entity keys and trees over a [`CacheService`]
//! - [`CachingStore`] -- read-through, write-through [`RemoteStore`](arbor_store::RemoteStore)
//! - [`CacheConfig`] -- enablement, write policy, cacheable kinds
//! - [`CacheStats`] -- per-kind hit, miss, and conflict counters
//!
//! # Storage Backends
//!
//! - [`InMemoryCacheService`] -- versioned in-memory cache for tests and
//!   single-process use
//!
//! # Design Rules
//!
//! 1. The store is written before the cache. The cache is never ahead of
//!    the store.
//! 2. Read fills are conditional on the token taken before the store read,
//!    so a stale reader cannot overwrite a fresher entry.
//! 3. Cache failures degrade to store access; they are never returned to
//!    the caller.

pub mod config;
pub mod entity;
pub mod error;
pub mod memory;
pub mod stats;
pub mod store;
pub mod traits;

pub use config::{CacheConfig, WritePolicy};
pub use entity::{CachedEntity, EntityCache, ABSENT_MARKER};
pub use error::{CacheError, CacheResult};
pub use memory::InMemoryCacheService;
pub use stats::{CacheStats, KindStats};
pub use store::CachingStore;
pub use traits::{CacheService, CasOutcome, CasToken, Identifiable};
