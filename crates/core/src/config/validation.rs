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
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_version` or `user_agent` is empty
    /// - a manifest path is not absolute, or the manifest is empty
    /// - `root_document` is not part of the manifest
    /// - an entry ceiling or the freshness horizon is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported scheme: {}", origin.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.cache_version.trim().is_empty() || self.cache_version.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "cache_version".into(),
                reason: "must be a non-empty token without whitespace".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.precache_manifest.is_empty() {
            return Err(ConfigError::Invalid {
                field: "precache_manifest".into(),
                reason: "must list at least one path".into(),
            });
        }
        if let Some(path) = self.precache_manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "precache_manifest".into(),
                reason: format!("path must start with '/': {path}"),
            });
        }

        if !self.precache_manifest.contains(&self.root_document) {
            return Err(ConfigError::Invalid {
                field: "root_document".into(),
                reason: "must be listed in precache_manifest".into(),
            });
        }

        if self.max_dynamic_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_dynamic_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_image_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_image_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.freshness_minutes <= 0 {
            return Err(ConfigError::Invalid {
                field: "freshness_minutes".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_image_entries < self.max_dynamic_entries {
            tracing::warn!(
                max_dynamic_entries = self.max_dynamic_entries,
                max_image_entries = self.max_image_entries,
                "Image ceiling is below the general ceiling; \
                 image writes will trim general content harder"
            );
        }

        Ok(())
    }
}
