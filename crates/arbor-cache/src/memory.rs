use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CacheError, CacheResult};
use crate::traits::{CacheService, CasOutcome, CasToken, Identifiable};

#[derive(Debug, Default)]
struct Slot {
    value: Option<Vec<u8>>,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    clock: u64,
}

impl Inner {
    fn write(&mut self, key: &str, value: Option<Vec<u8>>) {
        self.clock += 1;
        let version = self.clock;
        let slot = self.slots.entry(key.to_string()).or_default();
        slot.value = value;
        slot.version = version;
    }

    fn version(&self, key: &str) -> u64 {
        self.slots.get(key).map_or(0, |s| s.version)
    }
}

/// In-memory cache with per-key versions.
///
/// Versions come from a single counter and survive deletes, so a token
/// issued before a delete never matches afterwards, even when the key held
/// no value. A key never written or deleted has version 0.
#[derive(Debug, Default)]
pub struct InMemoryCacheService {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl InMemoryCacheService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently holding a value.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("lock poisoned")
            .slots
            .values()
            .filter(|s| s.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw value at `key`, bypassing the availability switch.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .expect("lock poisoned")
            .slots
            .get(key)
            .and_then(|s| s.value.clone())
    }

    /// Simulate an outage: every call fails with [`CacheError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheService for InMemoryCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.peek(key))
    }

    async fn get_identifiable(&self, key: &str) -> CacheResult<Identifiable> {
        self.check()?;
        let inner = self.inner.lock().expect("lock poisoned");
        Ok(Identifiable {
            value: inner.slots.get(key).and_then(|s| s.value.clone()),
            token: CasToken(inner.version(key)),
        })
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.check()?;
        self.inner.lock().expect("lock poisoned").write(key, Some(value));
        Ok(())
    }

    async fn put_if_untouched(
        &self,
        key: &str,
        token: CasToken,
        value: Vec<u8>,
    ) -> CacheResult<CasOutcome> {
        self.check()?;
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.version(key) != token.0 {
            return Ok(CasOutcome::Conflict);
        }
        inner.write(key, Some(value));
        Ok(CasOutcome::Stored)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.inner.lock().expect("lock poisoned").write(key, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let cache = InMemoryCacheService::new();
        assert_eq!(cache.get("a").await.unwrap(), None);
        cache.put("a", vec![1]).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some(vec![1]));
        cache.delete("a").await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn interleaved_cas_has_one_winner() {
        let cache = InMemoryCacheService::new();
        let first = cache.get_identifiable("k").await.unwrap();
        let second = cache.get_identifiable("k").await.unwrap();
        assert_eq!(first.value, None);

        let a = cache.put_if_untouched("k", first.token, vec![1]).await.unwrap();
        let b = cache.put_if_untouched("k", second.token, vec![2]).await.unwrap();
        assert_eq!(a, CasOutcome::Stored);
        assert_eq!(b, CasOutcome::Conflict);
        assert_eq!(cache.peek("k"), Some(vec![1]));
    }

    #[tokio::test]
    async fn delete_invalidates_tokens() {
        let cache = InMemoryCacheService::new();
        cache.put("k", vec![1]).await.unwrap();
        let seen = cache.get_identifiable("k").await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(
            cache.put_if_untouched("k", seen.token, vec![9]).await.unwrap(),
            CasOutcome::Conflict
        );
        let fresh = cache.get_identifiable("k").await.unwrap();
        assert_eq!(fresh.value, None);
        assert_eq!(
            cache.put_if_untouched("k", fresh.token, vec![9]).await.unwrap(),
            CasOutcome::Stored
        );
    }

    #[tokio::test]
    async fn delete_of_absent_key_invalidates_tokens() {
        let cache = InMemoryCacheService::new();
        let seen = cache.get_identifiable("k").await.unwrap();
        assert_eq!(seen.value, None);
        cache.delete("k").await.unwrap();
        assert!(cache.is_empty());
        assert_eq!(
            cache.put_if_untouched("k", seen.token, vec![9]).await.unwrap(),
            CasOutcome::Conflict
        );
        assert_eq!(cache.peek("k"), None);
    }

    #[tokio::test]
    async fn unconditional_put_invalidates_tokens() {
        let cache = InMemoryCacheService::new();
        let seen = cache.get_identifiable("k").await.unwrap();
        cache.put("k", vec![5]).await.unwrap();
        assert_eq!(
            cache.put_if_untouched("k", seen.token, vec![6]).await.unwrap(),
            CasOutcome::Conflict
        );
    }

    #[tokio::test]
    async fn bulk_operations() {
        let cache = InMemoryCacheService::new();
        cache
            .put_all(vec![("a".into(), vec![1]), ("b".into(), vec![2])])
            .await
            .unwrap();
        let found = cache
            .get_all(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        cache.delete_all(&["a".into(), "b".into()]).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn outage() {
        let cache = InMemoryCacheService::new();
        cache.set_unavailable(true);
        assert!(matches!(
            cache.get("a").await,
            Err(CacheError::Unavailable(_))
        ));
    }
}
