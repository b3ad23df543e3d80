//! Entity-level view of a byte cache: keys are entity keys, values are
//! property trees or the absent marker.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_tree::MapNode;
use arbor_types::Key;

use crate::error::{CacheError, CacheResult};
use crate::traits::{CacheService, CasOutcome, CasToken};

/// Stored in place of a tree when the store confirmed the key is absent.
///
/// A bincode-encoded tree is never a single byte, so the marker cannot
/// collide with a real record.
pub const ABSENT_MARKER: &[u8] = &[0xFF];

/// A cached lookup result.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedEntity {
    Found(MapNode),
    /// The store has no record at this key.
    Absent,
}

impl CachedEntity {
    pub fn into_node(self) -> Option<MapNode> {
        match self {
            CachedEntity::Found(node) => Some(node),
            CachedEntity::Absent => None,
        }
    }
}

impl From<Option<MapNode>> for CachedEntity {
    fn from(node: Option<MapNode>) -> Self {
        node.map_or(CachedEntity::Absent, CachedEntity::Found)
    }
}

/// Encodes entity keys and trees for a [`CacheService`].
#[derive(Clone)]
pub struct EntityCache {
    service: Arc<dyn CacheService>,
    namespace: String,
}

impl EntityCache {
    pub fn new(service: Arc<dyn CacheService>, namespace: impl Into<String>) -> Self {
        Self {
            service,
            namespace: namespace.into(),
        }
    }

    /// Cache key for an entity key.
    pub fn cache_key(&self, key: &Key) -> String {
        format!("{}{}", self.namespace, key.to_encoded())
    }

    pub fn encode(&self, key: &Key, entry: &CachedEntity) -> CacheResult<Vec<u8>> {
        match entry {
            CachedEntity::Absent => Ok(ABSENT_MARKER.to_vec()),
            CachedEntity::Found(node) => node.to_bytes().map_err(|e| CacheError::Codec {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn decode(&self, key: &Key, bytes: &[u8]) -> CacheResult<CachedEntity> {
        if bytes == ABSENT_MARKER {
            return Ok(CachedEntity::Absent);
        }
        MapNode::from_bytes(bytes)
            .map(CachedEntity::Found)
            .map_err(|e| CacheError::Codec {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// `None` on a cache miss.
    pub async fn get(&self, key: &Key) -> CacheResult<Option<CachedEntity>> {
        match self.service.get(&self.cache_key(key)).await? {
            Some(bytes) => Ok(Some(self.decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Like [`Self::get`], plus a token for a later conditional write.
    ///
    /// An entry that fails to decode is reported as a miss, as in
    /// [`Self::get_identifiables`].
    pub async fn get_identifiable(
        &self,
        key: &Key,
    ) -> CacheResult<(Option<CachedEntity>, CasToken)> {
        let found = self.service.get_identifiable(&self.cache_key(key)).await?;
        let entry = found.value.and_then(|bytes| self.decode(key, &bytes).ok());
        Ok((entry, found.token))
    }

    /// Identifiable reads for several keys.
    ///
    /// An entry that fails to decode is reported as a miss so the caller
    /// refetches it and overwrites it with the token.
    pub async fn get_identifiables(
        &self,
        keys: &[Key],
    ) -> CacheResult<HashMap<Key, (Option<CachedEntity>, CasToken)>> {
        let cache_keys: Vec<String> = keys.iter().map(|k| self.cache_key(k)).collect();
        let mut found = self.service.get_identifiables(&cache_keys).await?;
        let mut out = HashMap::with_capacity(keys.len());
        for (key, cache_key) in keys.iter().zip(&cache_keys) {
            let Some(item) = found.remove(cache_key) else {
                continue;
            };
            let entry = item.value.and_then(|bytes| self.decode(key, &bytes).ok());
            out.insert(key.clone(), (entry, item.token));
        }
        Ok(out)
    }

    pub async fn put(&self, key: &Key, entry: &CachedEntity) -> CacheResult<()> {
        let bytes = self.encode(key, entry)?;
        self.service.put(&self.cache_key(key), bytes).await
    }

    pub async fn put_if_untouched(
        &self,
        key: &Key,
        token: CasToken,
        entry: &CachedEntity,
    ) -> CacheResult<CasOutcome> {
        let bytes = self.encode(key, entry)?;
        self.service
            .put_if_untouched(&self.cache_key(key), token, bytes)
            .await
    }

    pub async fn put_all(&self, entries: &[(Key, CachedEntity)]) -> CacheResult<()> {
        let encoded = entries
            .iter()
            .map(|(key, entry)| Ok((self.cache_key(key), self.encode(key, entry)?)))
            .collect::<CacheResult<Vec<_>>>()?;
        self.service.put_all(encoded).await
    }

    pub async fn delete_all(&self, keys: &[Key]) -> CacheResult<()> {
        let cache_keys: Vec<String> = keys.iter().map(|k| self.cache_key(k)).collect();
        self.service.delete_all(&cache_keys).await
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("namespace", &self.namespace)
            .finish()
    }
}
