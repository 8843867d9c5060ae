//! Worker and application configuration.
//!
//! `WorkerConfig` is the per-worker configuration object: cache version,
//! the three namespace names derived from it, the origin the worker serves
//! and the essential file set. It is built once and handed to every handler.
//!
//! `Settings` is the persisted user configuration read by the command line
//! driver. It is stored at `~/.config/openbalti-sw/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Current cache version. Bump it to invalidate every cache on the next
/// activation.
pub const CACHE_VERSION: &str = "v4.0.0";

/// Prefix shared by every namespace this worker owns
const CACHE_PREFIX: &str = "openbalti";

/// Requests whose path starts with this prefix use the API strategy
const API_PREFIX: &str = "/api/";

/// Files that must be cached for the app to work offline, in install order.
/// Must match the deployed assets.
pub const ESSENTIAL_FILES: &[&str] = &[
    "/",
    "/manifest.json",
    "/favicon.ico",
    "/logo.png",
    "/android-chrome-512x512.png",
];

/// Essential files whose failure aborts installation
pub const MANDATORY_FILES: &[&str] = &["/", "/manifest.json"];

/// Default origin when nothing is configured
pub const DEFAULT_ORIGIN: &str = "https://openbalti.com";

/// Application name used for config/cache directory paths
const APP_NAME: &str = "openbalti-sw";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// The three cache roles a worker writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRole {
    Static,
    Dynamic,
    Api,
}

impl CacheRole {
    pub const ALL: [CacheRole; 3] = [CacheRole::Static, CacheRole::Dynamic, CacheRole::Api];

    fn label(self) -> &'static str {
        match self {
            CacheRole::Static => "static",
            CacheRole::Dynamic => "dynamic",
            CacheRole::Api => "api",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub version: String,
    pub static_cache: String,
    pub dynamic_cache: String,
    pub api_cache: String,
    pub origin: Url,
    pub api_prefix: String,
    pub essential_files: Vec<String>,
    pub mandatory_files: Vec<String>,
    /// Request activation as soon as install succeeds
    pub skip_waiting_on_install: bool,
}

impl WorkerConfig {
    pub fn new(origin: Url) -> Self {
        Self::build(origin, CACHE_VERSION)
    }

    /// Same configuration under a different cache version.
    pub fn with_version(self, version: &str) -> Self {
        Self {
            version: version.to_string(),
            static_cache: namespace(CacheRole::Static, version),
            dynamic_cache: namespace(CacheRole::Dynamic, version),
            api_cache: namespace(CacheRole::Api, version),
            ..self
        }
    }

    fn build(origin: Url, version: &str) -> Self {
        Self {
            version: version.to_string(),
            static_cache: namespace(CacheRole::Static, version),
            dynamic_cache: namespace(CacheRole::Dynamic, version),
            api_cache: namespace(CacheRole::Api, version),
            origin,
            api_prefix: API_PREFIX.to_string(),
            essential_files: ESSENTIAL_FILES.iter().map(|s| s.to_string()).collect(),
            mandatory_files: MANDATORY_FILES.iter().map(|s| s.to_string()).collect(),
            skip_waiting_on_install: true,
        }
    }

    pub fn cache_name(&self, role: CacheRole) -> &str {
        match role {
            CacheRole::Static => &self.static_cache,
            CacheRole::Dynamic => &self.dynamic_cache,
            CacheRole::Api => &self.api_cache,
        }
    }

    /// Namespaces that survive activation for this version
    pub fn valid_caches(&self) -> [&str; 3] {
        [&self.static_cache, &self.dynamic_cache, &self.api_cache]
    }

    pub fn is_mandatory(&self, path: &str) -> bool {
        self.mandatory_files.iter().any(|p| p == path)
    }

    /// Resolve a path such as `/manifest.json` against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        self.origin.join(path)
    }
}

fn namespace(role: CacheRole, version: &str) -> String {
    format!("{}-{}-{}", CACHE_PREFIX, role.label(), version)
}

/// Persisted settings for the command line driver.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub origin: Option<String>,
    pub cache_version: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `OPENBALTI_ORIGIN` / `OPENBALTI_CACHE_VERSION` on top of the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(origin) = std::env::var("OPENBALTI_ORIGIN") {
            if !origin.is_empty() {
                self.origin = Some(origin);
            }
        }
        if let Ok(version) = std::env::var("OPENBALTI_CACHE_VERSION") {
            if !version.is_empty() {
                self.cache_version = Some(version);
            }
        }
        self
    }

    pub fn worker_config(&self) -> Result<WorkerConfig> {
        let origin = self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        let origin = Url::parse(origin).with_context(|| format!("Invalid origin: {}", origin))?;
        if !matches!(origin.scheme(), "http" | "https") {
            anyhow::bail!("Origin must be http or https: {}", origin);
        }
        let config = WorkerConfig::new(origin);
        Ok(match self.cache_version.as_deref() {
            Some(version) => config.with_version(version),
            None => config,
        })
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
