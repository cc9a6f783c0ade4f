//! Mod catalog: the remote `mods.json` and its local cache

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

use crate::error::Result;
use crate::http::HttpClient;
use crate::logging::Logger;
use crate::paths::AppPaths;

// ============================================================================
// Catalog Types
// ============================================================================

/// A game a fix applies to
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub steam_appid: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModDefinition {
    /// `owner/name` on the release host
    pub repo: String,
    /// Config files that are merged rather than overwritten
    #[serde(default)]
    pub config_files: Vec<String>,
    #[serde(default)]
    pub games: Vec<GameRef>,
}

pub type Catalog = BTreeMap<String, ModDefinition>;

// ============================================================================
// Sources
// ============================================================================

pub trait CatalogSource {
    fn fetch_catalog(&self) -> Result<Catalog>;
}

/// Fetches `mods.json` over HTTP
pub struct RemoteCatalog {
    url: String,
    http: HttpClient,
    log: Logger,
}

impl RemoteCatalog {
    pub fn new(url: impl Into<String>, http: HttpClient, log: Logger) -> Self {
        Self {
            url: url.into(),
            http,
            log,
        }
    }
}

impl CatalogSource for RemoteCatalog {
    fn fetch_catalog(&self) -> Result<Catalog> {
        self.log.info("Fetching latest mods.json...");
        self.http.get_json(&self.url, None)
    }
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Serialize, Deserialize)]
struct CacheMeta {
    /// Unix timestamp (seconds) of the last successful fetch
    fetched_at: f64,
}

/// Time-windowed cache of the catalog in the data directory
pub struct CatalogCache {
    paths: AppPaths,
    ttl_hours: f64,
    log: Logger,
}

impl CatalogCache {
    pub fn new(paths: AppPaths, ttl_hours: f64, log: Logger) -> Self {
        Self {
            paths,
            ttl_hours,
            log,
        }
    }

    /// Return the catalog, using the cache unless it is stale or
    /// `force_remote` is set. When a non-forced refresh fails, a stale cache
    /// is still preferred over failing outright.
    pub fn get(&self, source: &dyn CatalogSource, force_remote: bool) -> Result<Catalog> {
        if !force_remote && self.is_fresh() {
            if let Some(catalog) = self.read_cached() {
                self.log.debug("Using cached mods.json");
                return Ok(catalog);
            }
        }

        match source.fetch_catalog() {
            Ok(catalog) => {
                self.write(&catalog)?;
                Ok(catalog)
            }
            Err(e) if !force_remote => match self.read_cached() {
                Some(catalog) => {
                    self.log.warning(&format!("Could not refresh mods.json ({}); using cached copy", e));
                    Ok(catalog)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    fn is_fresh(&self) -> bool {
        let Ok(content) = fs::read_to_string(self.paths.cache_meta_file()) else {
            return false;
        };
        let Ok(meta) = serde_json::from_str::<CacheMeta>(&content) else {
            return false;
        };
        let age_hours = (now_secs() - meta.fetched_at) / 3600.0;
        age_hours < self.ttl_hours
    }

    fn read_cached(&self) -> Option<Catalog> {
        let content = fs::read_to_string(self.paths.catalog_file()).ok()?;
        match serde_json::from_str(&content) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                self.log.debug(&format!("Ignoring unreadable mods.json cache: {}", e));
                None
            }
        }
    }

    fn write(&self, catalog: &Catalog) -> Result<()> {
        self.paths.ensure()?;
        fs::write(self.paths.catalog_file(), serde_json::to_string_pretty(catalog)?)?;
        let meta = CacheMeta {
            fetched_at: now_secs(),
        };
        fs::write(self.paths.cache_meta_file(), serde_json::to_string(&meta)?)?;
        Ok(())
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
