use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::logging::Logger;
use crate::paths::AppPaths;

pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/sharkusmanch/quickfix/master/mods.json";

// ============================================================================
// Release Host
// ============================================================================

/// Forge that hosts the fix repositories
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseHost {
    #[default]
    Codeberg,
    Github,
}

impl ReleaseHost {
    pub fn api_base(&self) -> &'static str {
        match self {
            ReleaseHost::Codeberg => "https://codeberg.org/api/v1",
            ReleaseHost::Github => "https://api.github.com",
        }
    }

    /// Environment variable holding an optional API token
    pub fn token_env(&self) -> &'static str {
        match self {
            ReleaseHost::Codeberg => "CODEBERG_TOKEN",
            ReleaseHost::Github => "GITHUB_TOKEN",
        }
    }

    pub fn authorization(&self, token: &str) -> String {
        match self {
            ReleaseHost::Codeberg => format!("token {}", token),
            ReleaseHost::Github => format!("Bearer {}", token),
        }
    }

    pub fn latest_release_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base(), repo)
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
    pub catalog_url: String,
    pub release_host: ReleaseHost,
    pub cache_ttl_hours: f64,
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub max_attempts: u32,
    pub verify_checksums: bool,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            release_host: ReleaseHost::default(),
            cache_ttl_hours: 6.0,
            metadata_timeout_secs: 10,
            download_timeout_secs: 30,
            max_attempts: 3,
            verify_checksums: true,
            debug: false,
        }
    }
}

impl Settings {
    /// Load `config.json`; a missing file means defaults, a broken one is
    /// reported and also falls back to defaults.
    pub fn load(paths: &AppPaths, log: &Logger) -> Self {
        let path = paths.settings_file();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path).map(|content| serde_json::from_str(&content)) {
            Ok(Ok(settings)) => settings,
            Ok(Err(e)) => {
                log.warning(&format!("Ignoring malformed {}: {}", path.display(), e));
                Self::default()
            }
            Err(e) => {
                log.warning(&format!("Could not read {}: {}", path.display(), e));
                Self::default()
            }
        }
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
