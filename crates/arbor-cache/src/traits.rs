use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CacheResult;

/// Version token returned by an identifiable read.
///
/// Opaque to callers: it is only handed back to
/// [`CacheService::put_if_untouched`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CasToken(pub u64);

/// Result of an identifiable read: the value (if any) plus the token that
/// guards a later conditional write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifiable {
    pub value: Option<Vec<u8>>,
    pub token: CasToken,
}

/// Outcome of a conditional write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    Stored,
    /// Another writer touched the entry after the token was issued.
    Conflict,
}

/// Byte-valued key/value cache with optimistic concurrency.
///
/// All implementations must satisfy these invariants:
/// - Every write or delete of a key invalidates tokens issued for it before.
/// - A token can be obtained for a key that holds no value, so a first write
///   can be made conditional too.
/// - Bulk operations are independent per key; there is no atomicity across
///   keys.
#[async_trait]
pub trait CacheService: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Read several keys. Misses are absent from the result.
    async fn get_all(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    /// Read a key along with a token for a later [`Self::put_if_untouched`].
    async fn get_identifiable(&self, key: &str) -> CacheResult<Identifiable>;

    async fn get_identifiables(&self, keys: &[String]) -> CacheResult<HashMap<String, Identifiable>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            found.insert(key.clone(), self.get_identifiable(key).await?);
        }
        Ok(found)
    }

    /// Unconditional overwrite.
    async fn put(&self, key: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Write only if the entry is unchanged since `token` was issued.
    async fn put_if_untouched(
        &self,
        key: &str,
        token: CasToken,
        value: Vec<u8>,
    ) -> CacheResult<CasOutcome>;

    async fn put_all(&self, entries: Vec<(String, Vec<u8>)>) -> CacheResult<()> {
        for (key, value) in entries {
            self.put(&key, value).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn delete_all(&self, keys: &[String]) -> CacheResult<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}
