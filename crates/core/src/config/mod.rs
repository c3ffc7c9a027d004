//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HOOD_MAP_*)
//! 2. TOML config file (if HOOD_MAP_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HOOD_MAP_*)
/// 2. TOML config file (if HOOD_MAP_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite site repository.
    ///
    /// Set via HOOD_MAP_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prefix prepended to `{key}/{filename}` when resolving blob URLs.
    ///
    /// Set via HOOD_MAP_BLOB_URL_PREFIX environment variable.
    #[serde(default = "default_blob_url_prefix")]
    pub blob_url_prefix: String,

    /// Whether the image cache is warmed in the background at startup.
    ///
    /// Set via HOOD_MAP_WARMUP_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub warmup_enabled: bool,

    /// Grace period before the warm-up build, in milliseconds.
    ///
    /// Set via HOOD_MAP_WARMUP_GRACE_MS environment variable.
    #[serde(default = "default_warmup_grace_ms")]
    pub warmup_grace_ms: u64,

    /// A bulk site import is pending; warm-up is skipped while it runs.
    ///
    /// Set via HOOD_MAP_IMPORT_ON_BOOT environment variable.
    #[serde(default)]
    pub import_on_boot: bool,

    /// Age after which a cached snapshot is rebuilt on read. 0 disables,
    /// except while `import_on_boot` is set (see [`AppConfig::snapshot_ttl`]).
    ///
    /// Set via HOOD_MAP_SNAPSHOT_TTL_SECS environment variable.
    #[serde(default)]
    pub snapshot_ttl_secs: u64,

    /// Default number of images for the random gallery.
    ///
    /// Set via HOOD_MAP_RANDOM_IMAGE_COUNT environment variable.
    #[serde(default = "default_random_image_count")]
    pub random_image_count: usize,

    /// Default number of images sampled per site.
    ///
    /// Set via HOOD_MAP_SITE_IMAGE_COUNT environment variable.
    #[serde(default = "default_site_image_count")]
    pub site_image_count: usize,

    /// Addresses of the sites shown in the landing-page header strip.
    ///
    /// Set via HOOD_MAP_HEADER_SITE_ADDRESSES environment variable (comma-separated).
    #[serde(default = "default_header_site_addresses", deserialize_with = "string_list")]
    pub header_site_addresses: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./hood-map.sqlite3")
}

fn default_blob_url_prefix() -> String {
    "/blobs".into()
}

fn default_warmup_grace_ms() -> u64 {
    2_000
}

fn default_random_image_count() -> usize {
    50
}

fn default_site_image_count() -> usize {
    3
}

fn default_header_site_addresses() -> Vec<String> {
    [
        "815 Milwaukee Street",
        "1020 Milwaukee Street",
        "1017 Milwaukee Street",
        "903 Dodge Street",
        "1102 Dodge Street",
        "805 Dodge Street",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
    true
}

/// Snapshot TTL applied while a bulk import is pending and none is configured.
const IMPORT_SNAPSHOT_TTL: Duration = Duration::from_secs(300);

/// Accept either a sequence or a single comma-separated string.
///
/// Entries are trimmed and empty ones dropped.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringList {
        List(Vec<String>),
        Joined(String),
    }

    let entries = match StringList::deserialize(deserializer)? {
        StringList::List(list) => list,
        StringList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            blob_url_prefix: default_blob_url_prefix(),
            warmup_enabled: true,
            warmup_grace_ms: default_warmup_grace_ms(),
            import_on_boot: false,
            snapshot_ttl_secs: 0,
            random_image_count: default_random_image_count(),
            site_image_count: default_site_image_count(),
            header_site_addresses: default_header_site_addresses(),
        }
    }
}

impl AppConfig {
    /// Warm-up grace period as Duration for use with tokio.
    pub fn warmup_grace(&self) -> Duration {
        Duration::from_millis(self.warmup_grace_ms)
    }

    /// Snapshot time-to-live, or `None` when snapshots never go stale.
    ///
    /// With `import_on_boot` set and no explicit TTL, snapshots expire after
    /// five minutes: a read during the import may cache an empty or partial
    /// index, and it must not outlive the import.
    pub fn snapshot_ttl(&self) -> Option<Duration> {
        if self.snapshot_ttl_secs > 0 {
            return Some(Duration::from_secs(self.snapshot_ttl_secs));
        }
        self.import_on_boot.then_some(IMPORT_SNAPSHOT_TTL)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HOOD_MAP_`
    /// 2. TOML file from `HOOD_MAP_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HOOD_MAP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HOOD_MAP_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
