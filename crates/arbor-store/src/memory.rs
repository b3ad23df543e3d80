use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::RwLock;

use arbor_tree::{Limits, MapNode};
use arbor_types::Key;
use async_trait::async_trait;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::RemoteStore;

/// In-memory, `BTreeMap`-based remote store.
///
/// Intended for tests and embedding. Records are held behind a `RwLock` and
/// cloned on read and write. Every call counts as one round-trip, and every
/// key read counts as one lookup, so tests can assert how often the store
/// was actually contacted.
pub struct InMemoryRemoteStore {
    records: RwLock<BTreeMap<Key, MapNode>>,
    limits: Limits,
    next_id: AtomicI64,
    round_trips: AtomicUsize,
    key_lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryRemoteStore {
    /// Create an empty store enforcing the default [`Limits`].
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            limits,
            next_id: AtomicI64::new(1),
            round_trips: AtomicUsize::new(0),
            key_lookups: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Peek at a record without counting a round-trip.
    pub fn peek(&self, key: &Key) -> Option<MapNode> {
        self.records.read().expect("lock poisoned").get(key).cloned()
    }

    /// All stored keys in key order.
    pub fn keys(&self) -> Vec<Key> {
        self.records
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.write().expect("lock poisoned").clear();
    }

    /// Calls made against the store since creation or the last reset.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Keys read since creation or the last reset.
    pub fn key_lookups(&self) -> usize {
        self.key_lookups.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.round_trips.store(0, Ordering::SeqCst);
        self.key_lookups.store(0, Ordering::SeqCst);
    }

    /// Simulate an outage: every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn begin_call(&self, lookups: usize) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        self.key_lookups.fetch_add(lookups, Ordering::SeqCst);
        Ok(())
    }

    fn check(&self, key: &Key, node: &MapNode) -> StoreResult<()> {
        self.limits.check(node).map_err(|err| {
            debug!(key = %key, error = %err, "store write rejected");
            StoreError::from(err)
        })
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get(&self, key: &Key) -> StoreResult<Option<MapNode>> {
        self.begin_call(1)?;
        debug!(key = %key, "store get");
        Ok(self.records.read().expect("lock poisoned").get(key).cloned())
    }

    async fn get_many(&self, keys: &[Key]) -> StoreResult<HashMap<Key, MapNode>> {
        self.begin_call(keys.len())?;
        debug!(count = keys.len(), "store get_many");
        let records = self.records.read().expect("lock poisoned");
        Ok(keys
            .iter()
            .filter_map(|k| records.get(k).map(|n| (k.clone(), n.clone())))
            .collect())
    }

    async fn put(&self, key: &Key, node: MapNode) -> StoreResult<Key> {
        self.begin_call(0)?;
        self.check(key, &node)?;
        debug!(key = %key, "store put");
        self.records
            .write()
            .expect("lock poisoned")
            .insert(key.clone(), node);
        Ok(key.clone())
    }

    async fn put_many(&self, records: Vec<(Key, MapNode)>) -> StoreResult<Vec<Key>> {
        self.begin_call(0)?;
        for (key, node) in &records {
            self.check(key, node)?;
        }
        let mut map = self.records.write().expect("lock poisoned");
        Ok(records
            .into_iter()
            .map(|(key, node)| {
                map.insert(key.clone(), node);
                key
            })
            .collect())
    }

    async fn delete(&self, key: &Key) -> StoreResult<()> {
        self.begin_call(0)?;
        self.records.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[Key]) -> StoreResult<()> {
        self.begin_call(0)?;
        let mut map = self.records.write().expect("lock poisoned");
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }

    async fn allocate_ids(
        &self,
        kind: &str,
        _parent: Option<&Key>,
        count: usize,
    ) -> StoreResult<Vec<i64>> {
        self.begin_call(0)?;
        let first = self.next_id.fetch_add(count as i64, Ordering::SeqCst);
        debug!(kind, count, first, "ids allocated");
        Ok((first..first + count as i64).collect())
    }
}

impl std::fmt::Debug for InMemoryRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRemoteStore")
            .field("record_count", &self.len())
            .field("round_trips", &self.round_trips())
            .finish()
    }
}
