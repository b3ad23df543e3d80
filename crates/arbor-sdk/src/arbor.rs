use std::sync::{Arc, Mutex};

use arbor_cache::{CacheService, CacheStats, CachingStore};
use arbor_session::Session;
use arbor_store::RemoteStore;
use arbor_translate::{
    ClassMeta, ConfigError, Registry, RegistryBuilder, Stringifier, TranslatorFactory,
};
use tracing::{debug, info};

use crate::config::ArborConfig;
use crate::error::SdkResult;

enum Phase {
    Open(RegistryBuilder),
    Frozen(Arc<Registry>),
}

/// Entry point: owns the registry lifecycle and opens sessions.
///
/// Classes, factories and stringifiers are registered first. The first
/// call to [`Arbor::begin`] (or [`Arbor::freeze`]) builds every translator,
/// surfacing configuration errors, and freezes the registry; later
/// registrations fail with [`ConfigError::Frozen`].
pub struct Arbor {
    store: Arc<dyn RemoteStore>,
    caching: Option<Arc<CachingStore>>,
    config: ArborConfig,
    phase: Mutex<Phase>,
}

impl Arbor {
    /// Sessions talk to `store` directly.
    pub fn new(store: Arc<dyn RemoteStore>, config: ArborConfig) -> Self {
        Self {
            store,
            caching: None,
            config,
            phase: Mutex::new(Phase::Open(RegistryBuilder::new())),
        }
    }

    /// Sessions go through an entity cache on `cache`, unless the cache is
    /// disabled in `config`.
    pub fn with_cache(
        store: Arc<dyn RemoteStore>,
        cache: Arc<dyn CacheService>,
        config: ArborConfig,
    ) -> Self {
        if !config.cache.enabled {
            info!("entity cache disabled by configuration");
            return Self::new(store, config);
        }
        let caching = Arc::new(CachingStore::new(store, cache, config.cache.clone()));
        Self {
            store: caching.clone(),
            caching: Some(caching),
            config,
            phase: Mutex::new(Phase::Open(RegistryBuilder::new())),
        }
    }

    pub fn config(&self) -> &ArborConfig {
        &self.config
    }

    fn with_builder<R>(&self, f: impl FnOnce(&mut RegistryBuilder) -> SdkResult<R>) -> SdkResult<R> {
        match &mut *self.phase.lock().expect("lock poisoned") {
            Phase::Open(builder) => f(builder),
            Phase::Frozen(_) => Err(ConfigError::Frozen.into()),
        }
    }

    pub fn register(&self, class: ClassMeta) -> SdkResult<()> {
        self.with_builder(|b| Ok(b.register(class)?))
    }

    /// Add a user translator factory; user factories are consulted before
    /// the built-ins, in registration order.
    pub fn register_factory(&self, factory: Arc<dyn TranslatorFactory>) -> SdkResult<()> {
        self.with_builder(|b| {
            b.add_factory(factory);
            Ok(())
        })
    }

    /// Make a stringifier available to map fields under `name`.
    pub fn register_stringifier(
        &self,
        name: impl Into<String>,
        stringifier: Arc<dyn Stringifier>,
    ) -> SdkResult<()> {
        self.with_builder(|b| {
            b.add_stringifier(name, stringifier);
            Ok(())
        })
    }

    pub fn is_frozen(&self) -> bool {
        matches!(*self.phase.lock().expect("lock poisoned"), Phase::Frozen(_))
    }

    /// Build and freeze the registry. Idempotent.
    ///
    /// On a configuration error the registry stays open.
    pub fn freeze(&self) -> SdkResult<Arc<Registry>> {
        let mut phase = self.phase.lock().expect("lock poisoned");
        let registry = match &*phase {
            Phase::Frozen(registry) => return Ok(registry.clone()),
            Phase::Open(builder) => Arc::new(builder.build()?),
        };
        info!(kinds = ?registry.kinds(), "registry frozen");
        *phase = Phase::Frozen(registry.clone());
        Ok(registry)
    }

    /// Open a session, freezing the registry on first use.
    pub fn begin(&self) -> SdkResult<Session> {
        let registry = self.freeze()?;
        debug!("session opened");
        Ok(Session::new(
            registry,
            self.store.clone(),
            self.config.limits.clone(),
        ))
    }

    /// Cache counters, when sessions go through the entity cache.
    pub fn cache_stats(&self) -> Option<&Arc<CacheStats>> {
        self.caching.as_ref().map(|c| c.stats())
    }
}

impl std::fmt::Debug for Arbor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arbor")
            .field("cached", &self.caching.is_some())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
