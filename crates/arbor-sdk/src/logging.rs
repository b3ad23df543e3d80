use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{SdkError, SdkResult};

/// Install a fmt subscriber filtered by `RUST_LOG`, or by the configured
/// level when `RUST_LOG` is unset.
///
/// Returns `false` if a global subscriber was already installed; calling it
/// twice is harmless.
pub fn init_logging(config: &LoggingConfig) -> SdkResult<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| SdkError::Logging(e.to_string()))?,
    };
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .is_ok())
}
