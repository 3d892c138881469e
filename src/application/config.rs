//! Engine configuration.

use serde::Deserialize;
use std::time::Duration;

/// How long an idle entry stays cached before the sweep evicts it.
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(5 * 60);
/// Soft upper bound on tracked digests, enforced by the sweep.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 2000;
/// How often the sweep runs.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
/// Deduplication is off until a window is configured.
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::ZERO;

/// Error returned when an engine configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The sweep interval must be greater than zero
    #[error("cleanup interval must be greater than 0")]
    ZeroCleanupInterval,
    /// The cache must be allowed to hold at least one entry
    #[error("max cache size must be greater than 0")]
    ZeroMaxCacheSize,
}

/// Named options controlling the engine. Each is independently defaultable.
///
/// Durations deserialize from milliseconds, so the struct can be embedded in
/// a host configuration file:
///
/// ```
/// # use log_dedup::DedupConfig;
/// let cfg: DedupConfig = serde_json::from_str(r#"{"duplicate_window_ms": 60000}"#).unwrap();
/// assert_eq!(cfg.duplicate_window.as_secs(), 60);
/// assert_eq!(cfg.max_cache_size, 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    #[serde(rename = "cache_expiry_ms", with = "millis")]
    pub cache_expiry: Duration,
    pub max_cache_size: usize,
    #[serde(rename = "cleanup_interval_ms", with = "millis")]
    pub cleanup_interval: Duration,
    #[serde(rename = "duplicate_window_ms", with = "millis")]
    pub duplicate_window: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            cache_expiry: DEFAULT_CACHE_EXPIRY,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
        }
    }
}

impl DedupConfig {
    /// Check the configuration.
    ///
    /// # Errors
    /// Returns `BuildError` if the sweep interval or cache size is zero.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.cleanup_interval.is_zero() {
            return Err(BuildError::ZeroCleanupInterval);
        }
        if self.max_cache_size == 0 {
            return Err(BuildError::ZeroMaxCacheSize);
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_agent_defaults() {
        let cfg = DedupConfig::default();
        assert_eq!(cfg.cache_expiry, Duration::from_secs(300));
        assert_eq!(cfg.max_cache_size, 2000);
        assert_eq!(cfg.cleanup_interval, Duration::from_secs(60));
        assert!(cfg.duplicate_window.is_zero());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let cfg = DedupConfig {
            cleanup_interval: Duration::ZERO,
            ..DedupConfig::default()
        };
        assert_eq!(cfg.validate(), Err(BuildError::ZeroCleanupInterval));

        let cfg = DedupConfig {
            max_cache_size: 0,
            ..DedupConfig::default()
        };
        assert_eq!(cfg.validate(), Err(BuildError::ZeroMaxCacheSize));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let cfg: DedupConfig =
            serde_json::from_str(r#"{"cache_expiry_ms": 1500, "max_cache_size": 10}"#).unwrap();

        assert_eq!(cfg.cache_expiry, Duration::from_millis(1500));
        assert_eq!(cfg.max_cache_size, 10);
        assert_eq!(cfg.cleanup_interval, DEFAULT_CLEANUP_INTERVAL);
        assert_eq!(cfg.duplicate_window, DEFAULT_DUPLICATE_WINDOW);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            BuildError::ZeroMaxCacheSize.to_string(),
            "max cache size must be greater than 0"
        );
    }
}
