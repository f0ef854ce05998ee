//! Configuration for the offline layer.
//!
//! Covers cache generation names, the app-shell manifest, the tile server
//! template, and where on disk the store and caches live.
//!
//! Configuration is stored at `~/.config/tripcache/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheNames;
use crate::controller::{ControllerOptions, DEFAULT_OFFLINE_PAGE, DEFAULT_TRIP_PACKAGE_PREFIX};
use crate::fetch::REQUEST_TIMEOUT_SECS;
use crate::sync::DEFAULT_SYNC_TAG;
use crate::tiles::{TileUrlTemplate, DEFAULT_TILE_CONCURRENCY, MAX_TILE_CONCURRENCY};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tripcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Bump when the app shell changes so clients drop the old generation.
const DEFAULT_APP_SHELL_CACHE: &str = "tripcache-shell-v2";
const DEFAULT_TILE_CACHE: &str = "tripcache-tiles-v1";

const DEFAULT_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

const ENV_ORIGIN: &str = "TRIPCACHE_ORIGIN";
const ENV_TILE_URL: &str = "TRIPCACHE_TILE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app_shell_cache: String,
    pub tile_cache: String,
    /// Origin of the web app, e.g. `https://trips.example.com`.
    pub origin: Option<String>,
    /// App-shell URLs; relative paths are resolved against `origin`.
    pub manifest: Vec<String>,
    pub offline_page: String,
    pub trip_package_prefix: String,
    pub tile_url_template: String,
    /// Values substituted for `{s}` in the tile template.
    pub tile_subdomains: Vec<String>,
    pub request_timeout_secs: u64,
    pub tile_concurrency: usize,
    pub sync_tag: String,
    pub data_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_shell_cache: DEFAULT_APP_SHELL_CACHE.to_string(),
            tile_cache: DEFAULT_TILE_CACHE.to_string(),
            origin: None,
            manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                DEFAULT_OFFLINE_PAGE.to_string(),
                "/manifest.json".to_string(),
            ],
            offline_page: DEFAULT_OFFLINE_PAGE.to_string(),
            trip_package_prefix: DEFAULT_TRIP_PACKAGE_PREFIX.to_string(),
            tile_url_template: DEFAULT_TILE_URL.to_string(),
            tile_subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            tile_concurrency: DEFAULT_TILE_CONCURRENCY,
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
            data_dir: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `TRIPCACHE_ORIGIN` and `TRIPCACHE_TILE_URL` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(origin) = std::env::var(ENV_ORIGIN) {
            if !origin.is_empty() {
                self.origin = Some(origin);
            }
        }
        if let Ok(template) = std::env::var(ENV_TILE_URL) {
            if !template.is_empty() {
                self.tile_url_template = template;
            }
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Directory of the persistent store documents.
    pub fn store_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("store"))
    }

    /// Root directory of the response caches.
    pub fn caches_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("caches"))
    }

    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.app_shell_cache, &self.tile_cache)
    }

    pub fn tile_template(&self) -> TileUrlTemplate {
        TileUrlTemplate::new(&self.tile_url_template).with_subdomains(self.tile_subdomains.clone())
    }

    pub fn tile_concurrency(&self) -> usize {
        self.tile_concurrency.clamp(1, MAX_TILE_CONCURRENCY)
    }

    /// Resolve a path against `origin`. Absolute URLs and paths without a
    /// configured origin are returned unchanged.
    pub fn resolve(&self, path: &str) -> String {
        let Some(ref origin) = self.origin else {
            return path.to_string();
        };
        match Url::parse(origin).and_then(|base| base.join(path)) {
            Ok(url) => url.to_string(),
            Err(_) => path.to_string(),
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            manifest: self.manifest.iter().map(|p| self.resolve(p)).collect(),
            offline_page: self.resolve(&self.offline_page),
            trip_package_prefix: self.resolve(&self.trip_package_prefix),
        }
    }
}
