//! `.quickfix` marker left in a game directory after an install
//!
//! The ledger is authoritative. The marker lets someone browsing the game
//! folder see which fix was dropped there, and lets QuickFix recognise
//! installs made before the ledger tracked files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const MARKER_FILE: &str = ".quickfix";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InstallMarker {
    pub mod_name: String,
    pub version: String,
    pub game_name: String,
    pub installed_at: DateTime<Utc>,
}

impl InstallMarker {
    pub fn new(mod_name: &str, version: &str, game_name: &str) -> Self {
        Self {
            mod_name: mod_name.to_string(),
            version: version.to_string(),
            game_name: game_name.to_string(),
            installed_at: Utc::now(),
        }
    }

    fn path(game_dir: &Path) -> PathBuf {
        game_dir.join(MARKER_FILE)
    }

    pub fn write(&self, game_dir: &Path) -> Result<()> {
        fs::write(Self::path(game_dir), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read the marker, if the directory has a readable one
    pub fn read(game_dir: &Path) -> Option<Self> {
        let content = fs::read_to_string(Self::path(game_dir)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Remove the marker only if it belongs to `mod_name`. Returns whether a
    /// marker was removed.
    pub fn remove_if_owned(game_dir: &Path, mod_name: &str) -> Result<bool> {
        match Self::read(game_dir) {
            Some(marker) if marker.mod_name == mod_name => {
                fs::remove_file(Self::path(game_dir))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
