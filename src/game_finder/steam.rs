//! Steam game detection
//!
//! Finds a game's install directory by App ID by scanning every Steam
//! library for `appmanifest_<appid>.acf`.

use std::fs;
use std::path::{Path, PathBuf};

use super::vdf::{parse_library_folders, AppManifest};
use super::{GameInstall, GameLocator};
use crate::logging::Logger;

/// Overrides every built-in Steam location
pub const STEAM_DIR_ENV: &str = "STEAM_DIR";

/// Steam locations relative to `$HOME` on Linux
const LINUX_STEAM_PATHS: &[&str] = &[
    ".local/share/Steam",
    ".steam/debian-installation",
    ".steam/steam",
    ".var/app/com.valvesoftware.Steam/data/Steam",
    ".var/app/com.valvesoftware.Steam/.local/share/Steam",
    "snap/steam/common/.local/share/Steam",
];

const WINDOWS_STEAM_PATHS: &[&str] = &[r"C:\Program Files (x86)\Steam", r"C:\Program Files\Steam"];

pub struct SteamLocator {
    roots: Vec<PathBuf>,
    log: Logger,
}

impl SteamLocator {
    /// Locator over the Steam installations present on this machine
    pub fn detect(log: Logger) -> Self {
        let roots = find_steam_roots(&candidate_roots());
        for root in &roots {
            log.debug(&format!("Found Steam installation: {}", root.display()));
        }
        if roots.is_empty() {
            log.warning("No Steam installation found");
        }
        Self { roots, log }
    }

    /// Locator over explicit Steam roots
    pub fn with_roots(roots: Vec<PathBuf>, log: Logger) -> Self {
        Self { roots, log }
    }

    pub fn libraries(&self) -> Vec<PathBuf> {
        let mut libraries = Vec::new();
        for root in &self.roots {
            for library in library_folders(root) {
                if !libraries.contains(&library) {
                    libraries.push(library);
                }
            }
        }
        libraries
    }
}

impl GameLocator for SteamLocator {
    fn locate(&self, app_id: u32) -> Option<GameInstall> {
        let libraries = self.libraries();
        self.log.debug(&format!("Steam libraries to scan: {:?}", libraries));

        for library in libraries {
            let steamapps = library.join("steamapps");
            let manifest_path = steamapps.join(format!("appmanifest_{}.acf", app_id));
            let Ok(content) = fs::read_to_string(&manifest_path) else {
                continue;
            };

            let Some(manifest) = AppManifest::from_vdf(&content) else {
                self.log.warning(&format!("Failed to parse manifest {}", manifest_path.display()));
                continue;
            };

            let install_path = steamapps.join("common").join(&manifest.install_dir);
            self.log.debug(&format!("Checking for game install path: {}", install_path.display()));
            if install_path.is_dir() {
                return Some(GameInstall {
                    app_id,
                    name: manifest.name,
                    install_path,
                });
            }
        }

        None
    }
}

fn candidate_roots() -> Vec<PathBuf> {
    if let Some(dir) = std::env::var_os(STEAM_DIR_ENV).filter(|d| !d.is_empty()) {
        return vec![PathBuf::from(dir)];
    }

    if cfg!(windows) {
        return WINDOWS_STEAM_PATHS.iter().map(PathBuf::from).collect();
    }

    match dirs::home_dir() {
        Some(home) => LINUX_STEAM_PATHS.iter().map(|p| home.join(p)).collect(),
        None => Vec::new(),
    }
}

/// Keep candidates that look like Steam installs, collapsing symlinked
/// duplicates
fn find_steam_roots(candidates: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();

    for candidate in candidates {
        if !candidate.join("steamapps").is_dir() {
            continue;
        }
        let canonical = candidate.canonicalize().unwrap_or_else(|_| candidate.clone());
        if seen.contains(&canonical) {
            continue;
        }
        seen.push(canonical);
        roots.push(candidate.clone());
    }

    roots
}

/// The Steam root itself plus every library listed in `libraryfolders.vdf`
fn library_folders(steam_root: &Path) -> Vec<PathBuf> {
    let mut folders = vec![steam_root.to_path_buf()];

    for vdf in ["steamapps/libraryfolders.vdf", "config/libraryfolders.vdf"] {
        let Ok(content) = fs::read_to_string(steam_root.join(vdf)) else {
            continue;
        };
        for path in parse_library_folders(&content) {
            let path = PathBuf::from(path);
            if path.is_dir() && !folders.contains(&path) {
                folders.push(path);
            }
        }
    }

    folders
}
