//! Configuration loading.
//!
//! Sources in order of precedence (later sources override earlier):
//! 1. Bundled defaults (gallerist.toml shipped with the library)
//! 2. User config in home directory (~/.config/gallerist/gallerist.toml)
//! 3. User config in current directory (./gallerist.toml)
//! 4. Environment variables such as `GALLERIST__DATABASE__URL`

use config::{Config, Environment, File, FileFormat};
use gallerist_cache::ReadCacheConfig;
use gallerist_error::{ConfigError, GalleristError, GalleristResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../gallerist.toml");

/// Blob store location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for blobs
    pub base_dir: PathBuf,
    /// Public URL prefix the root is served under
    pub base_url: String,
}

/// Relational store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; `DATABASE_URL` is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl DatabaseConfig {
    /// The configured URL, falling back to `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error when neither is set.
    pub fn resolve_url(&self) -> GalleristResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        std::env::var("DATABASE_URL").map_err(|_| {
            GalleristError::from(ConfigError::new(
                "database.url is not configured and DATABASE_URL is not set",
            ))
        })
    }
}

/// Top-level Gallerist configuration.
///
/// # Example
///
/// ```no_run
/// use gallerist::GalleristConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GalleristConfig::load()?;
/// println!("Blobs under {}", config.storage.base_dir.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GalleristConfig {
    /// Blob store settings
    pub storage: StorageConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Read cache settings
    #[serde(default)]
    pub cache: ReadCacheConfig,
}

fn environment() -> Environment {
    Environment::with_prefix("GALLERIST")
        .prefix_separator("__")
        .separator("__")
}

fn finish(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> GalleristResult<GalleristConfig> {
    builder
        .build()
        .map_err(|e| {
            GalleristError::from(ConfigError::new(format!(
                "Failed to build configuration: {}",
                e
            )))
        })?
        .try_deserialize()
        .map_err(|e| {
            GalleristError::from(ConfigError::new(format!(
                "Failed to parse configuration: {}",
                e
            )))
        })
}

impl GalleristConfig {
    /// Load configuration from bundled defaults, user files and environment.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> GalleristResult<Self> {
        debug!(
            "Loading configuration with precedence: env > current dir > home dir > bundled defaults"
        );

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/gallerist/gallerist.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("gallerist").required(false))
            .add_source(environment());

        finish(builder)
    }

    /// Load configuration from a specific file layered over the bundled
    /// defaults. Environment variables still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> GalleristResult<Self> {
        debug!("Loading configuration from file");

        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()))
            .add_source(environment());

        finish(builder)
    }
}
