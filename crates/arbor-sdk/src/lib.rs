//! High-level SDK for Arbor.
//!
//! [`Arbor`] is the main entry point for applications: register entity and
//! embedded classes, optional translator factories and stringifiers, then
//! open [`Session`]s. The first session freezes the registry.
//!
//! ```ignore
//! let arbor = Arbor::with_cache(store, cache, ArborConfig::load("arbor.toml")?);
//! arbor.register(ClassMeta::entity("Person", "id", IdType::Long)
//!     .field(FieldMeta::new("name", TypeDesc::String)))?;
//! let session = arbor.begin()?;
//! let ann = session.load::<Person>(&Key::root("Person", 1)?).await?;
//! ```

pub mod arbor;
pub mod config;
pub mod error;
pub mod logging;

pub use arbor::Arbor;
pub use config::{ArborConfig, LoggingConfig};
pub use error::{SdkError, SdkResult};
pub use logging::init_logging;

// Re-export key types
pub use arbor_cache::{CacheConfig, CacheService, CacheStats, InMemoryCacheService, WritePolicy};
pub use arbor_session::{Entity, LoadScope, Ref, Session, SessionError, SessionResult};
pub use arbor_store::{InMemoryRemoteStore, RemoteStore};
pub use arbor_translate::{ClassMeta, Condition, FieldMeta, IdType, TypeDesc};
pub use arbor_tree::{Limits, MapNode};
pub use arbor_types::{Key, KeyId, Object, Value};
