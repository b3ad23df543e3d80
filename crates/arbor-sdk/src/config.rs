use std::path::Path;

use arbor_cache::CacheConfig;
use arbor_tree::Limits;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Top-level configuration. Every section is optional in TOML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    pub cache: CacheConfig,
    pub limits: Limits,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
        }
    }
}

impl ArborConfig {
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SdkError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use arbor_cache::WritePolicy;

    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ArborConfig::from_toml_str("").unwrap(), ArborConfig::default());
    }

    #[test]
    fn partial_sections() {
        let config = ArborConfig::from_toml_str(
            r#"
            [cache]
            write_policy = "invalidate"
            cacheable_kinds = ["Person"]

            [limits]
            max_list_len = 10

            [logging]
            level = "arbor_cache=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.write_policy, WritePolicy::Invalidate);
        assert!(config.cache.is_cacheable("Person"));
        assert!(!config.cache.is_cacheable("Pet"));
        assert_eq!(config.limits.max_list_len, 10);
        assert_eq!(config.limits.max_depth, Limits::default().max_depth);
        assert_eq!(config.logging.level, "arbor_cache=debug");
        assert!(config.logging.with_target);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cache]\nenabled = false").unwrap();
        let config = ArborConfig::load(file.path()).unwrap();
        assert!(!config.cache.enabled);
    }

    #[test]
    fn load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ArborConfig::load(dir.path().join("missing.toml")),
            Err(SdkError::ReadConfig { .. })
        ));
        assert!(matches!(
            ArborConfig::from_toml_str("[cache]\nenabled = 3"),
            Err(SdkError::ParseConfig(_))
        ));
    }
}
