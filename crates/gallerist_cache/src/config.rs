//! Read cache configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the read cache.
///
/// # Example
///
/// ```
/// use gallerist_cache::{ReadCacheConfig, ReadCacheConfigBuilder};
///
/// let config = ReadCacheConfigBuilder::default()
///     .default_ttl(30)
///     .max_size(16)
///     .enabled(true)
///     .build()
///     .unwrap();
/// assert_eq!(*config.default_ttl(), 30);
///
/// let disabled = ReadCacheConfig::default().with_enabled(false);
/// assert!(!disabled.enabled());
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
pub struct ReadCacheConfig {
    /// Default TTL for cached entries (seconds)
    #[serde(default = "default_ttl")]
    default_ttl: u64,

    /// Maximum cache size (number of entries)
    #[serde(default = "default_max_size")]
    max_size: usize,

    /// Whether caching is enabled
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_ttl() -> u64 {
    60
}

fn default_max_size() -> usize {
    64
}

fn default_enabled() -> bool {
    true
}

impl ReadCacheConfig {
    /// Default TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

impl Default for ReadCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            max_size: default_max_size(),
            enabled: default_enabled(),
        }
    }
}
