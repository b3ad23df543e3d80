use std::collections::HashMap;

use arbor_tree::MapNode;
use arbor_types::Key;
use async_trait::async_trait;

use crate::error::StoreResult;

/// Remote, schemaless store of property trees addressed by [`Key`].
///
/// All implementations must satisfy these invariants:
/// - A missing key reads as `Ok(None)`, never as an error.
/// - `put` replaces the whole record at the key.
/// - Batch operations have no atomicity across keys.
/// - Transactions, if the backend has them, are opaque to callers of this
///   trait.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the record at `key`.
    async fn get(&self, key: &Key) -> StoreResult<Option<MapNode>>;

    /// Read several records. Missing keys are absent from the result.
    ///
    /// Default implementation calls `get()` for each key. Backends should
    /// override it with a single round-trip.
    async fn get_many(&self, keys: &[Key]) -> StoreResult<HashMap<Key, MapNode>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(node) = self.get(key).await? {
                found.insert(key.clone(), node);
            }
        }
        Ok(found)
    }

    /// Write the record at `key` and return the key it was stored under.
    async fn put(&self, key: &Key, node: MapNode) -> StoreResult<Key>;

    /// Write several records.
    async fn put_many(&self, records: Vec<(Key, MapNode)>) -> StoreResult<Vec<Key>> {
        let mut keys = Vec::with_capacity(records.len());
        for (key, node) in records {
            keys.push(self.put(&key, node).await?);
        }
        Ok(keys)
    }

    /// Delete the record at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &Key) -> StoreResult<()>;

    async fn delete_many(&self, keys: &[Key]) -> StoreResult<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Reserve `count` unused numeric ids for entities of `kind` under
    /// `parent`.
    async fn allocate_ids(
        &self,
        kind: &str,
        parent: Option<&Key>,
        count: usize,
    ) -> StoreResult<Vec<i64>>;
}
