//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `db_path` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `warmup_grace_ms` exceeds one minute
    /// - `blob_url_prefix` is neither an absolute path nor an http(s) URL
    /// - `random_image_count` is 0 or above 500
    /// - `site_image_count` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "db_path".into(),
                hint: "Set HOOD_MAP_DB_PATH environment variable".into(),
            });
        }

        if self.warmup_grace_ms > 60_000 {
            return Err(ConfigError::Invalid {
                field: "warmup_grace_ms".into(),
                reason: "must not exceed 1 minute (60000ms)".into(),
            });
        }

        if !(self.blob_url_prefix.starts_with('/') || self.blob_url_prefix.starts_with("http")) {
            return Err(ConfigError::Invalid {
                field: "blob_url_prefix".into(),
                reason: "must start with '/' or an http(s) scheme".into(),
            });
        }

        if self.random_image_count == 0 || self.random_image_count > 500 {
            return Err(ConfigError::Invalid {
                field: "random_image_count".into(),
                reason: "must be between 1 and 500".into(),
            });
        }

        if self.site_image_count == 0 {
            return Err(ConfigError::Invalid {
                field: "site_image_count".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.import_on_boot && self.warmup_enabled {
            tracing::info!("import_on_boot is set; image cache warm-up will be skipped");
        }

        Ok(())
    }
}
