//! Configuration loaded from `digs.toml`
//!
//! Every section and key is optional; anything missing falls back to the
//! defaults below. Command-line flags override file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "digs.toml";

/// Largest `max_limit` a config file may set
pub const MAX_LIMIT_CEILING: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7878
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Per-statement deadline for search queries (0 = no deadline)
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("digs.db")
}

fn default_statement_timeout_ms() -> u64 {
    5_000
}

impl DatabaseConfig {
    pub fn statement_timeout(&self) -> Option<Duration> {
        match self.statement_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

/// Tunables for filter normalization, the radius predicate and response caching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result count when the request gives no `limit`
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper clamp for `limit`
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Limit used for the single retry after a statement timeout
    #[serde(default = "default_degraded_limit")]
    pub degraded_limit: usize,

    /// Radius of the coordinate predicate
    #[serde(default = "default_radius_meters")]
    pub radius_meters: f64,

    /// Cache TTL when a location, name or coordinate filter is present
    #[serde(default = "default_filtered_ttl_secs")]
    pub filtered_ttl_secs: u64,

    /// Cache TTL for unfiltered "browse" queries
    #[serde(default = "default_browse_ttl_secs")]
    pub browse_ttl_secs: u64,

    /// Country suffix stripped from free-text locations ("..., south africa")
    #[serde(default = "default_country")]
    pub country: String,

    /// Maximum number of cached responses held in memory
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    100
}

fn default_degraded_limit() -> usize {
    10
}

fn default_radius_meters() -> f64 {
    20_000.0
}

fn default_filtered_ttl_secs() -> u64 {
    60
}

fn default_browse_ttl_secs() -> u64 {
    180
}

fn default_country() -> String {
    "south africa".to_string()
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            degraded_limit: default_degraded_limit(),
            radius_meters: default_radius_meters(),
            filtered_ttl_secs: default_filtered_ttl_secs(),
            browse_ttl_secs: default_browse_ttl_secs(),
            country: default_country(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Load configuration
///
/// With an explicit path the file must exist. Without one, `digs.toml` in the
/// working directory is used if present, otherwise defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !path.exists() {
                log::debug!("No {} found, using default config", DEFAULT_CONFIG_FILE);
                return Ok(AppConfig::default());
            }
            path
        }
    };

    let config_str = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    let config = parse_config(&config_str)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;

    log::info!("Loaded config from {}", config_path.display());
    Ok(config)
}

/// Parse a TOML document into an `AppConfig`
pub fn parse_config(source: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(source)?;

    let search = &config.search;
    if !(1..=MAX_LIMIT_CEILING).contains(&search.max_limit) {
        anyhow::bail!("[search] max_limit must be between 1 and {}", MAX_LIMIT_CEILING);
    }
    if !(1..=search.max_limit).contains(&search.degraded_limit) {
        anyhow::bail!(
            "[search] degraded_limit must be between 1 and max_limit ({})",
            search.max_limit
        );
    }
    if config.search.radius_meters <= 0.0 || !config.search.radius_meters.is_finite() {
        anyhow::bail!("[search] radius_meters must be a positive number");
    }

    Ok(config)
}
