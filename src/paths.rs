use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{QuickFixError, Result};

/// Environment override for the data directory
pub const HOME_ENV: &str = "QUICKFIX_HOME";

pub const INSTALLED_MODS_FILE: &str = "installed.json";
pub const MODS_CACHE_FILE: &str = "mods.json";
pub const CACHE_META_FILE: &str = "cache_meta.json";
pub const SETTINGS_FILE: &str = "config.json";

/// Location of every file QuickFix persists for the current user.
///
/// Defaults to `QuickFix` under the platform config directory, which is
/// `%APPDATA%` on Windows and `~/.config` on Linux.
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the data directory from the environment and create it
    pub fn from_env() -> Result<Self> {
        let root = match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => dirs::config_dir()
                .ok_or(QuickFixError::NoDataDir)?
                .join("QuickFix"),
        };

        let paths = Self::new(root);
        paths.ensure()?;
        Ok(paths)
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_file(&self) -> PathBuf {
        self.root.join(INSTALLED_MODS_FILE)
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.root.join(MODS_CACHE_FILE)
    }

    pub fn cache_meta_file(&self) -> PathBuf {
        self.root.join(CACHE_META_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Scratch space for in-flight downloads
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_layout() {
        let paths = AppPaths::new("/data/QuickFix");
        assert_eq!(paths.ledger_file(), PathBuf::from("/data/QuickFix/installed.json"));
        assert_eq!(paths.catalog_file(), PathBuf::from("/data/QuickFix/mods.json"));
        assert_eq!(paths.cache_meta_file(), PathBuf::from("/data/QuickFix/cache_meta.json"));
        assert_eq!(paths.logs_dir(), PathBuf::from("/data/QuickFix/logs"));
    }

    #[test]
    fn test_ensure_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path().join("QuickFix"));
        paths.ensure().unwrap();
        assert!(paths.root().is_dir());
    }
}
