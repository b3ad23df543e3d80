use serde::{Deserialize, Serialize};

/// What the caching store does to the cache after a confirmed store write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Overwrite the entry with the written record (or the absent marker
    /// after a delete).
    #[default]
    WriteThrough,
    /// Drop the entry; the next read repopulates it.
    Invalidate,
}

/// Cache layer configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub write_policy: WritePolicy,
    /// Kinds to cache. Empty means every kind.
    pub cacheable_kinds: Vec<String>,
    /// Prefix of every cache key, so several applications can share a
    /// cache backend.
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            write_policy: WritePolicy::WriteThrough,
            cacheable_kinds: Vec::new(),
            namespace: "arbor:".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn is_cacheable(&self, kind: &str) -> bool {
        self.enabled && (self.cacheable_kinds.is_empty() || self.cacheable_kinds.iter().any(|k| k == kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_kind_list_caches_everything() {
        let config = CacheConfig::default();
        assert!(config.is_cacheable("Person"));
        let only_people = CacheConfig {
            cacheable_kinds: vec!["Person".into()],
            ..CacheConfig::default()
        };
        assert!(only_people.is_cacheable("Person"));
        assert!(!only_people.is_cacheable("Pet"));
        let disabled = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        assert!(!disabled.is_cacheable("Person"));
    }

    #[test]
    fn parses_partial_toml() {
        let config: CacheConfig = toml::from_str("write_policy = \"invalidate\"").unwrap();
        assert_eq!(config.write_policy, WritePolicy::Invalidate);
        assert!(config.enabled);
        assert_eq!(config.namespace, "arbor:");
    }
}
