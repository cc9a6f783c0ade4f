//! `installed.json`: which mods are installed, at which version, with which
//! files, for which game.
//!
//! Early releases stored a bare version string per mod. Those entries are
//! upgraded on load and the upgraded document is written back straight away.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::logging::Logger;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub version: String,
    /// Paths relative to the game directory, as written by the last extraction
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub game_appid: Option<u32>,
}

impl LedgerEntry {
    /// Whether uninstall can remove files, or only the tracking entry
    pub fn is_tracked(&self) -> bool {
        !self.files.is_empty() && self.game_appid.is_some()
    }
}

/// On-disk shape of one entry: try the structured form first
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Tracked(LedgerEntry),
    Legacy(String),
}

pub type InstalledMods = BTreeMap<String, LedgerEntry>;

pub struct Ledger {
    path: PathBuf,
    log: Logger,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, log: Logger) -> Self {
        Self {
            path: path.into(),
            log,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole ledger. A missing file is an empty ledger.
    pub fn load(&self) -> Result<InstalledMods> {
        if !self.path.exists() {
            return Ok(InstalledMods::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let stored: BTreeMap<String, StoredEntry> = serde_json::from_str(&content)?;

        let mut migrated = false;
        let mods: InstalledMods = stored
            .into_iter()
            .map(|(mod_id, entry)| {
                let entry = match entry {
                    StoredEntry::Tracked(entry) => entry,
                    StoredEntry::Legacy(version) => {
                        migrated = true;
                        LedgerEntry {
                            version,
                            files: Vec::new(),
                            game_appid: None,
                        }
                    }
                };
                (mod_id, entry)
            })
            .collect();

        if migrated {
            self.save(&mods)?;
            self.log.info("Migrated installed.json to new format.");
        }

        Ok(mods)
    }

    /// Replace the ledger with `mods`. The document goes to a sibling file
    /// first and is then renamed over the ledger.
    pub fn save(&self, mods: &InstalledMods) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(mods)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;

        self.log.debug(&format!("Saved {} ledger entries", mods.len()));
        Ok(())
    }
}
