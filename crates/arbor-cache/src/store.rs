//! A [`RemoteStore`] that reads through and writes through an entity cache.
//!
//! Reads take an identifiable cache read first. On a miss the store is
//! consulted and the result (record or absent marker) is written back with
//! `put_if_untouched`, so a reader holding stale data can never overwrite a
//! newer entry installed by a concurrent writer. A lost race is counted and
//! otherwise ignored: the store value already went to the caller.
//!
//! Writes go to the store first. Only after the store confirms does the
//! cache get an unconditional `put` (or a delete, under
//! [`WritePolicy::Invalidate`]). Cache failures never fail the operation;
//! they are logged and the store answers.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_store::{RemoteStore, StoreResult};
use arbor_tree::MapNode;
use arbor_types::Key;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{CacheConfig, WritePolicy};
use crate::entity::{CachedEntity, EntityCache};
use crate::stats::CacheStats;
use crate::traits::{CacheService, CasOutcome, CasToken};

pub struct CachingStore {
    store: Arc<dyn RemoteStore>,
    cache: EntityCache,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl CachingStore {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        service: Arc<dyn CacheService>,
        config: CacheConfig,
    ) -> Self {
        let cache = EntityCache::new(service, config.namespace.clone());
        Self {
            store,
            cache,
            config,
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn cacheable(&self, key: &Key) -> bool {
        self.config.is_cacheable(key.kind())
    }

    /// Install a store result unless someone touched the entry meanwhile.
    async fn fill(&self, key: &Key, token: CasToken, entry: &CachedEntity) {
        match self.cache.put_if_untouched(key, token, entry).await {
            Ok(CasOutcome::Stored) => {}
            Ok(CasOutcome::Conflict) => {
                self.stats.record_conflict(key.kind());
                debug!(key = %key, "cache fill lost race; keeping newer entry");
            }
            Err(err) => {
                self.stats.record_error(key.kind());
                warn!(key = %key, error = %err, "cache fill failed");
            }
        }
    }

    /// Bring the cache in line with a confirmed store write.
    async fn after_write(&self, entries: Vec<(Key, CachedEntity)>) {
        let entries: Vec<_> = entries
            .into_iter()
            .filter(|(key, _)| self.cacheable(key))
            .collect();
        if entries.is_empty() {
            return;
        }
        let result = match self.config.write_policy {
            WritePolicy::WriteThrough => self.cache.put_all(&entries).await,
            WritePolicy::Invalidate => {
                let keys: Vec<Key> = entries.iter().map(|(k, _)| k.clone()).collect();
                self.cache.delete_all(&keys).await
            }
        };
        if let Err(err) = result {
            warn!(count = entries.len(), error = %err, "cache update after write failed; invalidating");
            let keys: Vec<Key> = entries.into_iter().map(|(k, _)| k).collect();
            for key in &keys {
                self.stats.record_error(key.kind());
            }
            if let Err(err) = self.cache.delete_all(&keys).await {
                warn!(error = %err, "cache invalidation failed");
            }
        }
    }
}

#[async_trait]
impl RemoteStore for CachingStore {
    async fn get(&self, key: &Key) -> StoreResult<Option<MapNode>> {
        if !self.cacheable(key) {
            return self.store.get(key).await;
        }
        match self.cache.get_identifiable(key).await {
            Ok((Some(entry), _)) => {
                self.stats.record_hit(key.kind());
                debug!(key = %key, "cache hit");
                Ok(entry.into_node())
            }
            Ok((None, token)) => {
                self.stats.record_miss(key.kind());
                debug!(key = %key, "cache miss");
                let node = self.store.get(key).await?;
                self.fill(key, token, &CachedEntity::from(node.clone())).await;
                Ok(node)
            }
            Err(err) => {
                self.stats.record_error(key.kind());
                warn!(key = %key, error = %err, "cache read failed; using store");
                self.store.get(key).await
            }
        }
    }

    async fn get_many(&self, keys: &[Key]) -> StoreResult<HashMap<Key, MapNode>> {
        let (cacheable, direct): (Vec<Key>, Vec<Key>) =
            keys.iter().cloned().partition(|k| self.cacheable(k));

        let cached = if cacheable.is_empty() {
            HashMap::new()
        } else {
            match self.cache.get_identifiables(&cacheable).await {
                Ok(found) => found,
                Err(err) => {
                    warn!(count = cacheable.len(), error = %err, "cache read failed; using store");
                    for key in &cacheable {
                        self.stats.record_error(key.kind());
                    }
                    HashMap::new()
                }
            }
        };

        let mut result = HashMap::with_capacity(keys.len());
        let mut misses = direct;
        let mut tokens = Vec::new();
        for key in cacheable {
            match cached.get(&key) {
                Some((Some(entry), _)) => {
                    self.stats.record_hit(key.kind());
                    if let CachedEntity::Found(node) = entry {
                        result.insert(key, node.clone());
                    }
                }
                Some((None, token)) => {
                    self.stats.record_miss(key.kind());
                    tokens.push((key.clone(), *token));
                    misses.push(key);
                }
                None => misses.push(key),
            }
        }

        if !misses.is_empty() {
            let fetched = self.store.get_many(&misses).await?;
            for (key, token) in &tokens {
                let entry = CachedEntity::from(fetched.get(key).cloned());
                self.fill(key, *token, &entry).await;
            }
            result.extend(fetched);
        }
        Ok(result)
    }

    async fn put(&self, key: &Key, node: MapNode) -> StoreResult<Key> {
        let stored = self.store.put(key, node.clone()).await?;
        self.after_write(vec![(stored.clone(), CachedEntity::Found(node))])
            .await;
        Ok(stored)
    }

    async fn put_many(&self, records: Vec<(Key, MapNode)>) -> StoreResult<Vec<Key>> {
        let nodes: Vec<MapNode> = records.iter().map(|(_, n)| n.clone()).collect();
        let stored = self.store.put_many(records).await?;
        let entries = stored
            .iter()
            .cloned()
            .zip(nodes.into_iter().map(CachedEntity::Found))
            .collect();
        self.after_write(entries).await;
        Ok(stored)
    }

    async fn delete(&self, key: &Key) -> StoreResult<()> {
        self.store.delete(key).await?;
        self.after_write(vec![(key.clone(), CachedEntity::Absent)])
            .await;
        Ok(())
    }

    async fn delete_many(&self, keys: &[Key]) -> StoreResult<()> {
        self.store.delete_many(keys).await?;
        self.after_write(keys.iter().map(|k| (k.clone(), CachedEntity::Absent)).collect())
            .await;
        Ok(())
    }

    async fn allocate_ids(
        &self,
        kind: &str,
        parent: Option<&Key>,
        count: usize,
    ) -> StoreResult<Vec<i64>> {
        self.store.allocate_ids(kind, parent, count).await
    }
}

impl std::fmt::Debug for CachingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingStore")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}
