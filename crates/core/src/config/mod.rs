//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DEPOT_*)
//! 2. TOML config file (if DEPOT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DEPOT_*)
/// 2. TOML config file (if DEPOT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding both cache tiers.
    ///
    /// Set via DEPOT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the controller is scoped to. Manifest paths resolve against it.
    ///
    /// Set via DEPOT_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for network requests.
    ///
    /// Set via DEPOT_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Version tag baked into the shell and dynamic namespace names.
    ///
    /// Bumping it makes the next activation drop the previous namespaces.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Core asset paths pre-cached into the shell namespace at install.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// Path of the root document served when navigation has nothing else.
    #[serde(default = "default_root_document")]
    pub root_document: String,

    /// Ceiling for the dynamic namespace after a general write.
    #[serde(default = "default_max_dynamic_entries")]
    pub max_dynamic_entries: usize,

    /// Ceiling for the dynamic namespace after an image write.
    #[serde(default = "default_max_image_entries")]
    pub max_image_entries: usize,

    /// Partitions registered in the keyed store on open, in addition to the
    /// ones created by migrations.
    ///
    /// Set via DEPOT_EXTRA_PARTITIONS environment variable (array syntax: `[quotes,invoices]`).
    #[serde(default)]
    pub extra_partitions: Vec<String>,

    /// Freshness horizon for keyed store entries, in minutes.
    #[serde(default = "default_freshness_minutes")]
    pub freshness_minutes: i64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./depot-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_user_agent() -> String {
    "depot/0.1".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_precache_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/favicon.ico",
        "/static/js/main.js",
        "/static/css/main.css",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_root_document() -> String {
    "/index.html".into()
}

fn default_max_dynamic_entries() -> usize {
    50
}

fn default_max_image_entries() -> usize {
    100
}

fn default_freshness_minutes() -> i64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            cache_version: default_cache_version(),
            precache_manifest: default_precache_manifest(),
            root_document: default_root_document(),
            max_dynamic_entries: default_max_dynamic_entries(),
            max_image_entries: default_max_image_entries(),
            extra_partitions: Vec::new(),
            freshness_minutes: default_freshness_minutes(),
        }
    }
}

impl AppConfig {
    /// Freshness horizon as a chrono Duration for timestamp arithmetic.
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.freshness_minutes)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DEPOT_`
    /// 2. TOML file from `DEPOT_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("DEPOT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DEPOT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
