//! Mod lifecycle: install, update and uninstall against the ledger
//!
//! A mod is either absent from the ledger (not installed) or present with the
//! version, files and game it was installed with. Every operation here works
//! on one game at a time and returns its outcome as a value; the CLI decides
//! how to present it.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::archive::{self, checksum};
use crate::catalog::{Catalog, GameRef, ModDefinition};
use crate::config::Settings;
use crate::error::{QuickFixError, Result};
use crate::game_finder::{GameInstall, GameLocator};
use crate::ledger::{InstalledMods, Ledger, LedgerEntry};
use crate::logging::Logger;
use crate::marker::InstallMarker;
use crate::releases::{Release, ReleaseSource, ARCHIVE_EXTENSION};

/// `NotFound` subject for a catalog entry that lists no games
const SUPPORTED_GAME: &str = "Supported game";

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed {
        version: String,
        game: String,
        files: usize,
    },
    /// The ledger already records this version
    UpToDate { version: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed { files: usize, dirs: usize },
    /// Only the ledger entry was dropped; nothing on disk was touched
    TrackingOnly,
}

/// Per-mod results of `install --all` / `update --all`
#[derive(Debug, Default)]
pub struct BatchReport {
    pub installed: Vec<String>,
    pub up_to_date: Vec<String>,
    /// Mods whose game is not installed on this machine
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    fn record(&mut self, mod_id: &str, result: Result<InstallOutcome>, log: &Logger) {
        match result {
            Ok(InstallOutcome::Installed { .. }) => self.installed.push(mod_id.to_string()),
            Ok(InstallOutcome::UpToDate { .. }) => self.up_to_date.push(mod_id.to_string()),
            Err(e @ QuickFixError::GameNotFound { .. }) => {
                log.warning(&format!("Skipping {}: {}", mod_id, e));
                self.skipped.push(mod_id.to_string());
            }
            Err(QuickFixError::NotFound {
                what: SUPPORTED_GAME,
                ..
            }) => {
                log.warning(&format!("No games defined for mod {}. Skipping.", mod_id));
                self.skipped.push(mod_id.to_string());
            }
            Err(e) => {
                log.error(&format!("{} failed: {}", mod_id, e));
                self.failed.push((mod_id.to_string(), e.to_string()));
            }
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} installed, {} up to date, {} skipped, {} failed",
            self.installed.len(),
            self.up_to_date.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

/// Where a mod's config file was found (if anywhere) inside one game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLookup {
    pub game: String,
    pub file_name: String,
    pub path: Option<PathBuf>,
}

// ============================================================================
// Manager
// ============================================================================

pub struct ModManager<'a> {
    releases: &'a dyn ReleaseSource,
    games: &'a dyn GameLocator,
    ledger: Ledger,
    tmp_dir: PathBuf,
    verify_checksums: bool,
    log: Logger,
}

impl<'a> ModManager<'a> {
    pub fn new(
        releases: &'a dyn ReleaseSource,
        games: &'a dyn GameLocator,
        ledger: Ledger,
        settings: &Settings,
        tmp_dir: impl Into<PathBuf>,
        log: Logger,
    ) -> Self {
        Self {
            releases,
            games,
            ledger,
            tmp_dir: tmp_dir.into(),
            verify_checksums: settings.verify_checksums,
            log,
        }
    }

    pub fn installed(&self) -> Result<InstalledMods> {
        self.ledger.load()
    }

    /// Install the latest release of `mod_id` into the first supported game
    /// found on this machine. Unless `force` is set, a ledger entry already
    /// at the latest version makes this a no-op.
    pub fn install(&self, mod_id: &str, catalog: &Catalog, force: bool) -> Result<InstallOutcome> {
        let definition = lookup(catalog, mod_id)?;
        let mut mods = self.ledger.load()?;
        let release = self.releases.latest_release(&definition.repo)?;
        self.install_release(mod_id, definition, &release, &mut mods, force)
    }

    /// Reinstall an installed mod from its latest release. Refuses mods the
    /// ledger does not know about.
    pub fn update(&self, mod_id: &str, catalog: &Catalog, force: bool) -> Result<InstallOutcome> {
        let mut mods = self.ledger.load()?;
        let installed_version = match mods.get(mod_id) {
            Some(entry) => entry.version.clone(),
            None => return Err(QuickFixError::NotInstalled(mod_id.to_string())),
        };

        let definition = lookup(catalog, mod_id)?;
        let release = self.releases.latest_release(&definition.repo)?;

        if !force && installed_version == release.version {
            self.log.info(&format!(
                "Mod {} is already up to date (version {}). Skipping update.",
                mod_id, installed_version
            ));
            return Ok(InstallOutcome::UpToDate {
                version: installed_version,
            });
        }

        self.log.info(&format!(
            "Updating mod {} from version {} to {}...",
            mod_id, installed_version, release.version
        ));
        self.install_release(mod_id, definition, &release, &mut mods, true)
    }

    pub fn install_all(&self, catalog: &Catalog, force: bool) -> BatchReport {
        self.log.info("Scanning all available mods for installed games...");
        let mut report = BatchReport::default();
        for mod_id in catalog.keys() {
            report.record(mod_id, self.install(mod_id, catalog, force), &self.log);
        }
        report
    }

    pub fn update_all(&self, catalog: &Catalog, force: bool) -> Result<BatchReport> {
        let mods = self.ledger.load()?;
        let mut report = BatchReport::default();
        if mods.is_empty() {
            self.log.info("No mods are currently installed.");
            return Ok(report);
        }

        self.log.info("Updating all installed mods...");
        for mod_id in mods.keys() {
            report.record(mod_id, self.update(mod_id, catalog, force), &self.log);
        }
        Ok(report)
    }

    fn install_release(
        &self,
        mod_id: &str,
        definition: &ModDefinition,
        release: &Release,
        mods: &mut InstalledMods,
        force: bool,
    ) -> Result<InstallOutcome> {
        let existing = mods.get(mod_id);
        let (game, game_name) = self.locate_game(mod_id, definition, existing)?;

        if let Some(entry) = existing {
            if entry.version == release.version && !force {
                self.log.info(&format!(
                    "Mod {} is already up to date for {}. Skipping.",
                    mod_id, game_name
                ));
                return Ok(InstallOutcome::UpToDate {
                    version: entry.version.clone(),
                });
            }
        } else if let Some(marker) = InstallMarker::read(&game.install_path) {
            if marker.mod_name == mod_id {
                self.log.info(&format!(
                    "Found {} {} from an earlier install; reinstalling with file tracking",
                    mod_id, marker.version
                ));
            }
        }

        self.log.info(&format!("Installing {} for {} ({})...", mod_id, game_name, release.version));

        fs::create_dir_all(&self.tmp_dir)?;
        // Removed on drop, whichever way this function exits
        let mut scratch = tempfile::Builder::new()
            .prefix("quickfix-")
            .suffix(ARCHIVE_EXTENSION)
            .tempfile_in(&self.tmp_dir)?;

        self.log.download(&format!("Downloading {}", release.download_url));
        let bytes = self.releases.download(&release.download_url, scratch.as_file_mut())?;
        self.log.download(&format!("Downloaded {} ({} bytes)", release.archive_name, bytes));

        self.verify_download(release, scratch.path())?;

        let files = archive::extract_archive(
            scratch.path(),
            &game.install_path,
            &definition.config_files,
            &self.log,
        )?;

        let marker = InstallMarker::new(mod_id, &release.version, &game_name);
        if let Err(e) = marker.write(&game.install_path) {
            self.log.warning(&format!("Could not write install marker: {}", e));
        }

        let file_count = files.len();
        mods.insert(
            mod_id.to_string(),
            LedgerEntry {
                version: release.version.clone(),
                files,
                game_appid: Some(game.app_id),
            },
        );
        self.ledger.save(mods)?;

        self.log.install(&format!("Installation complete for {}!", game_name));
        Ok(InstallOutcome::Installed {
            version: release.version.clone(),
            game: game_name,
            files: file_count,
        })
    }

    fn verify_download(&self, release: &Release, archive_path: &Path) -> Result<()> {
        let Some(checksum_url) = release.checksum_url.as_deref() else {
            self.log.debug("Release publishes no checksum file");
            return Ok(());
        };
        if !self.verify_checksums {
            self.log.debug("Checksum verification disabled");
            return Ok(());
        }

        let listing = self.releases.fetch_text(checksum_url)?;
        match checksum::find_expected_hash(&listing, &release.archive_name) {
            Some(expected) => {
                checksum::verify_sha256(archive_path, &expected)?;
                self.log.info(&format!("Checksum verified for {}", release.archive_name));
            }
            None => self.log.warning(&format!(
                "Checksum file does not list {}; skipping verification",
                release.archive_name
            )),
        }
        Ok(())
    }

    /// The game recorded in the ledger if it can still be found, otherwise
    /// the first catalog game present on this machine
    fn locate_game(
        &self,
        mod_id: &str,
        definition: &ModDefinition,
        existing: Option<&LedgerEntry>,
    ) -> Result<(GameInstall, String)> {
        let Some(first) = definition.games.first() else {
            return Err(QuickFixError::not_found(SUPPORTED_GAME, mod_id));
        };

        let mut candidates: Vec<u32> = Vec::new();
        if let Some(app_id) = existing.and_then(|e| e.game_appid) {
            candidates.push(app_id);
        }
        for game in &definition.games {
            if !candidates.contains(&game.steam_appid) {
                candidates.push(game.steam_appid);
            }
        }

        for app_id in candidates {
            let catalog_game = definition.games.iter().find(|g| g.steam_appid == app_id);
            match self.games.locate(app_id) {
                Some(install) => {
                    let name = display_name(catalog_game, Some(&install), app_id);
                    self.log.debug(&format!("{} found at {}", name, install.install_path.display()));
                    return Ok((install, name));
                }
                None => self.log.debug(&format!(
                    "Could not find install path for {}",
                    display_name(catalog_game, None, app_id)
                )),
            }
        }

        Err(QuickFixError::GameNotFound {
            app_id: first.steam_appid,
            game: display_name(Some(first), None, first.steam_appid),
        })
    }

    /// Remove `mod_id` from the ledger, deleting its tracked files when the
    /// entry has them. The entry is dropped even if some deletions fail.
    pub fn uninstall(&self, mod_id: &str) -> Result<UninstallOutcome> {
        let mut mods = self.ledger.load()?;
        let entry = mods
            .remove(mod_id)
            .ok_or_else(|| QuickFixError::NotInstalled(mod_id.to_string()))?;

        let outcome = match entry.game_appid {
            _ if entry.files.is_empty() => {
                self.log.warning(&format!(
                    "Mod {} was installed before file tracking. Only removing from installed.json; its files were left in place.",
                    mod_id
                ));
                UninstallOutcome::TrackingOnly
            }
            None => {
                self.log.warning(&format!(
                    "No game appid recorded for {}. Removing tracking entry only.",
                    mod_id
                ));
                UninstallOutcome::TrackingOnly
            }
            Some(app_id) => match self.games.find_install_path(app_id) {
                Some(game_dir) => {
                    let outcome = self.remove_tracked_files(&game_dir, &entry.files);
                    match InstallMarker::remove_if_owned(&game_dir, mod_id) {
                        Ok(true) => self.log.debug("Removed install marker"),
                        Ok(false) => {}
                        Err(e) => self.log.warning(&format!("Could not remove install marker: {}", e)),
                    }
                    outcome
                }
                None => {
                    self.log.warning(&format!(
                        "Could not find game install path for appid {}. Removing tracking entry only.",
                        app_id
                    ));
                    UninstallOutcome::TrackingOnly
                }
            },
        };

        self.ledger.save(&mods)?;
        self.log.info(&format!("Uninstalled {}.", mod_id));
        Ok(outcome)
    }

    /// Delete exactly the recorded files, then every ancestor directory left
    /// empty, deepest first. The game directory itself is never removed.
    fn remove_tracked_files(&self, game_dir: &Path, files: &[String]) -> UninstallOutcome {
        let root = game_dir.canonicalize().unwrap_or_else(|_| game_dir.to_path_buf());
        let mut removed = 0;
        let mut ancestors: BTreeSet<PathBuf> = BTreeSet::new();

        for relative in files {
            let Some(target) = archive::resolve_within(&root, relative) else {
                self.log.warning(&format!("Refusing to remove path outside the game: {}", relative));
                continue;
            };
            if target == root {
                continue;
            }

            let mut parent = target.parent();
            while let Some(dir) = parent {
                if dir == root || !dir.starts_with(&root) {
                    break;
                }
                ancestors.insert(dir.to_path_buf());
                parent = dir.parent();
            }

            if !target.is_file() {
                self.log.debug(&format!("Already gone: {}", relative));
                continue;
            }
            match fs::remove_file(&target) {
                Ok(()) => {
                    removed += 1;
                    self.log.debug(&format!("Removed: {}", target.display()));
                }
                Err(e) => self.log.warning(&format!("Could not remove {}: {}", target.display(), e)),
            }
        }

        let mut ancestors: Vec<PathBuf> = ancestors.into_iter().collect();
        ancestors.sort_by_key(|dir| std::cmp::Reverse(dir.as_os_str().len()));

        let mut dirs = 0;
        for dir in ancestors {
            let is_empty = fs::read_dir(&dir).map(|mut d| d.next().is_none()).unwrap_or(false);
            if is_empty && fs::remove_dir(&dir).is_ok() {
                dirs += 1;
                self.log.debug(&format!("Removed empty dir: {}", dir.display()));
            }
        }

        self.log.info(&format!("Removed {} file(s) and {} empty folder(s).", removed, dirs));
        UninstallOutcome::Removed { files: removed, dirs }
    }

    /// Search every located game of `mod_id` for its config files
    pub fn find_config_files(&self, mod_id: &str, catalog: &Catalog) -> Result<Vec<ConfigLookup>> {
        let definition = lookup(catalog, mod_id)?;
        if definition.config_files.is_empty() {
            self.log.warning(&format!("No config files defined for {}.", mod_id));
            return Ok(Vec::new());
        }
        if definition.games.is_empty() {
            self.log.warning(&format!("No games defined for {}.", mod_id));
            return Ok(Vec::new());
        }

        let mut lookups = Vec::new();
        for game in &definition.games {
            let install = self.games.locate(game.steam_appid);
            let name = display_name(Some(game), install.as_ref(), game.steam_appid);
            let Some(install) = install else {
                self.log.warning(&format!("Could not find install path for {}.", name));
                continue;
            };

            self.log.info(&format!("Searching for config files for {}...", name));
            for file_name in &definition.config_files {
                lookups.push(ConfigLookup {
                    game: name.clone(),
                    file_name: file_name.clone(),
                    path: find_file(&install.install_path, file_name),
                });
            }
        }
        Ok(lookups)
    }
}

fn lookup<'c>(catalog: &'c Catalog, mod_id: &str) -> Result<&'c ModDefinition> {
    catalog.get(mod_id).ok_or_else(|| QuickFixError::not_found("Mod", mod_id))
}

/// Catalog name, then the manifest name, then a generic label
pub fn display_name(catalog_game: Option<&GameRef>, install: Option<&GameInstall>, app_id: u32) -> String {
    catalog_game
        .and_then(|g| g.name.clone())
        .or_else(|| install.and_then(|i| i.name.clone()))
        .unwrap_or_else(|| format!("Steam App {}", app_id))
}

/// First file under `root` named `file_name` (ASCII case ignored)
fn find_file(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| {
            e.file_type().is_file()
                && e.file_name().to_str().is_some_and(|n| n.eq_ignore_ascii_case(file_name))
        })
        .map(|e| e.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    const FOO_APPID: u32 = 100;

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    struct FakeReleases {
        version: RefCell<String>,
        archive: Vec<u8>,
        checksums: Option<String>,
        /// Repos whose download is not a zip
        corrupt_repos: RefCell<Vec<String>>,
        downloads: Cell<usize>,
    }

    impl FakeReleases {
        fn serving(version: &str, archive: Vec<u8>) -> Self {
            Self {
                version: RefCell::new(version.to_string()),
                archive,
                checksums: None,
                corrupt_repos: RefCell::new(Vec::new()),
                downloads: Cell::new(0),
            }
        }
    }

    impl ReleaseSource for FakeReleases {
        fn latest_release(&self, repo: &str) -> Result<Release> {
            Ok(Release {
                version: self.version.borrow().clone(),
                archive_name: "Fix.zip".to_string(),
                download_url: format!("https://dl.example/{}/Fix.zip", repo),
                checksum_url: self
                    .checksums
                    .as_ref()
                    .map(|_| "https://dl.example/sha256sums.txt".to_string()),
            })
        }

        fn download(&self, url: &str, dest: &mut File) -> Result<u64> {
            self.downloads.set(self.downloads.get() + 1);
            if self.corrupt_repos.borrow().iter().any(|r| url.contains(r.as_str())) {
                dest.write_all(b"<html>rate limited</html>")?;
                return Ok(25);
            }
            dest.write_all(&self.archive)?;
            Ok(self.archive.len() as u64)
        }

        fn fetch_text(&self, url: &str) -> Result<String> {
            self.checksums
                .clone()
                .ok_or_else(|| QuickFixError::not_found("Asset", url))
        }
    }

    #[derive(Default)]
    struct FakeLocator {
        games: HashMap<u32, PathBuf>,
    }

    impl GameLocator for FakeLocator {
        fn locate(&self, app_id: u32) -> Option<GameInstall> {
            self.games.get(&app_id).map(|path| GameInstall {
                app_id,
                name: None,
                install_path: path.clone(),
            })
        }
    }

    struct Fixture {
        _dir: TempDir,
        game_dir: PathBuf,
        data_dir: PathBuf,
        locator: FakeLocator,
        log: Logger,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let game_dir = dir.path().join("Foo");
            let data_dir = dir.path().join("QuickFix");
            fs::create_dir_all(&game_dir).unwrap();
            let mut locator = FakeLocator::default();
            locator.games.insert(FOO_APPID, game_dir.clone());
            Self {
                _dir: dir,
                game_dir,
                data_dir,
                locator,
                log: Logger::capture(true),
            }
        }

        fn manager<'a>(&'a self, releases: &'a FakeReleases) -> ModManager<'a> {
            let ledger = Ledger::new(self.data_dir.join("installed.json"), self.log.clone());
            ModManager::new(
                releases,
                &self.locator,
                ledger,
                &Settings::default(),
                self.data_dir.join("tmp"),
                self.log.clone(),
            )
        }

        fn count_lines(&self, needle: &str) -> usize {
            self.log.captured().iter().filter(|l| l.contains(needle)).count()
        }
    }

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(
            "FooFix".to_string(),
            ModDefinition {
                repo: "Lyall/FooFix".to_string(),
                config_files: vec!["FooFix.ini".to_string()],
                games: vec![GameRef {
                    name: Some("Foo".to_string()),
                    steam_appid: FOO_APPID,
                }],
            },
        );
        catalog
    }

    #[test]
    fn test_install_twice_downloads_once() {
        let fx = Fixture::new();
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));
        let manager = fx.manager(&releases);

        let first = manager.install("FooFix", &catalog(), false).unwrap();
        assert_eq!(
            first,
            InstallOutcome::Installed {
                version: "v1.0".to_string(),
                game: "Foo".to_string(),
                files: 1,
            }
        );
        let second = manager.install("FooFix", &catalog(), false).unwrap();
        assert_eq!(second, InstallOutcome::UpToDate { version: "v1.0".to_string() });

        assert_eq!(releases.downloads.get(), 1);
        assert_eq!(fx.count_lines("Saved 1 ledger entries"), 1);

        let entry = &manager.installed().unwrap()["FooFix"];
        assert_eq!(entry.files, vec!["a.dll".to_string()]);
        assert_eq!(entry.game_appid, Some(FOO_APPID));
        assert_eq!(InstallMarker::read(&fx.game_dir).unwrap().version, "v1.0");
    }

    #[test]
    fn test_force_reinstalls_same_version() {
        let fx = Fixture::new();
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));
        let manager = fx.manager(&releases);

        manager.install("FooFix", &catalog(), false).unwrap();
        let again = manager.install("FooFix", &catalog(), true).unwrap();
        assert!(matches!(again, InstallOutcome::Installed { .. }));
        assert_eq!(releases.downloads.get(), 2);
    }

    #[test]
    fn test_scratch_file_removed_after_install() {
        let fx = Fixture::new();
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));
        fx.manager(&releases).install("FooFix", &catalog(), false).unwrap();

        assert_eq!(fs::read_dir(fx.data_dir.join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_uninstall_removes_exactly_tracked_files() {
        let fx = Fixture::new();
        fs::write(fx.game_dir.join("game.exe"), "game").unwrap();
        fs::create_dir_all(fx.game_dir.join("saves")).unwrap();
        let releases = FakeReleases::serving(
            "v1.0",
            zip_bytes(&[("a.dll", "dll"), ("sub/b.ini", "[A]\nk=v\n")]),
        );
        let manager = fx.manager(&releases);
        manager.install("FooFix", &catalog(), false).unwrap();
        assert!(fx.game_dir.join("sub/b.ini").is_file());

        let outcome = manager.uninstall("FooFix").unwrap();
        assert_eq!(outcome, UninstallOutcome::Removed { files: 2, dirs: 1 });

        assert!(!fx.game_dir.join("a.dll").exists());
        assert!(!fx.game_dir.join("sub").exists());
        assert!(fx.game_dir.join("game.exe").is_file());
        assert!(fx.game_dir.join("saves").is_dir());
        assert!(fx.game_dir.is_dir());
        assert!(InstallMarker::read(&fx.game_dir).is_none());
        assert!(manager.installed().unwrap().is_empty());
    }

    #[test]
    fn test_uninstall_keeps_directory_with_user_files() {
        let fx = Fixture::new();
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("sub/deep/b.dll", "dll")]));
        let manager = fx.manager(&releases);
        manager.install("FooFix", &catalog(), false).unwrap();
        fs::write(fx.game_dir.join("sub/user.txt"), "mine").unwrap();

        let outcome = manager.uninstall("FooFix").unwrap();
        assert_eq!(outcome, UninstallOutcome::Removed { files: 1, dirs: 1 });
        assert!(!fx.game_dir.join("sub/deep").exists());
        assert!(fx.game_dir.join("sub/user.txt").is_file());
    }

    #[test]
    fn test_untracked_uninstall_only_drops_entry() {
        let fx = Fixture::new();
        fs::create_dir_all(&fx.data_dir).unwrap();
        fs::write(fx.data_dir.join("installed.json"), r#"{"FooFix": "v0.9"}"#).unwrap();
        fs::write(fx.game_dir.join("FooFix.asi"), "asi").unwrap();
        let releases = FakeReleases::serving("v1.0", Vec::new());
        let manager = fx.manager(&releases);

        let outcome = manager.uninstall("FooFix").unwrap();
        assert_eq!(outcome, UninstallOutcome::TrackingOnly);
        assert!(fx.game_dir.join("FooFix.asi").is_file());
        assert!(manager.installed().unwrap().is_empty());
        assert_eq!(fx.count_lines("[WARN] Mod FooFix was installed before file tracking"), 1);
    }

    #[test]
    fn test_uninstall_without_game_id_only_drops_entry() {
        let fx = Fixture::new();
        fs::create_dir_all(&fx.data_dir).unwrap();
        fs::write(
            fx.data_dir.join("installed.json"),
            r#"{"FooFix": {"version": "v1.0", "files": ["a.dll"], "game_appid": null}}"#,
        )
        .unwrap();
        fs::write(fx.game_dir.join("a.dll"), "dll").unwrap();
        let releases = FakeReleases::serving("v1.0", Vec::new());
        let manager = fx.manager(&releases);

        assert_eq!(manager.uninstall("FooFix").unwrap(), UninstallOutcome::TrackingOnly);
        assert!(fx.game_dir.join("a.dll").is_file());
        assert!(manager.installed().unwrap().is_empty());
        assert_eq!(fx.count_lines("[WARN] No game appid recorded for FooFix"), 1);
    }

    #[test]
    fn test_uninstall_with_vanished_game_only_drops_entry() {
        let fx = Fixture::new();
        fs::create_dir_all(&fx.data_dir).unwrap();
        fs::write(
            fx.data_dir.join("installed.json"),
            r#"{"FooFix": {"version": "v1.0", "files": ["a.dll"], "game_appid": 999}}"#,
        )
        .unwrap();
        fs::write(fx.game_dir.join("a.dll"), "dll").unwrap();
        let releases = FakeReleases::serving("v1.0", Vec::new());
        let manager = fx.manager(&releases);

        assert_eq!(manager.uninstall("FooFix").unwrap(), UninstallOutcome::TrackingOnly);
        assert!(fx.game_dir.join("a.dll").is_file());
        assert!(manager.installed().unwrap().is_empty());
        assert_eq!(
            fx.count_lines("[WARN] Could not find game install path for appid 999"),
            1
        );
    }

    #[test]
    fn test_uninstall_unknown_mod() {
        let fx = Fixture::new();
        let releases = FakeReleases::serving("v1.0", Vec::new());
        let err = fx.manager(&releases).uninstall("Nope").unwrap_err();
        assert!(matches!(err, QuickFixError::NotInstalled(id) if id == "Nope"));
    }

    #[test]
    fn test_install_all_skips_missing_games() {
        let fx = Fixture::new();
        let mut catalog = catalog();
        catalog.insert(
            "BarFix".to_string(),
            ModDefinition {
                repo: "Lyall/BarFix".to_string(),
                config_files: vec![],
                games: vec![GameRef {
                    name: None,
                    steam_appid: 200,
                }],
            },
        );
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));

        let report = fx.manager(&releases).install_all(&catalog, false);
        assert_eq!(report.installed, vec!["FooFix".to_string()]);
        assert_eq!(report.skipped, vec!["BarFix".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(
            fx.count_lines("[WARN] Skipping BarFix: Could not find an install path for Steam App 200"),
            1
        );
    }

    fn catalog_with_second_mod(games: Vec<GameRef>) -> Catalog {
        let mut catalog = catalog();
        // Sorts before FooFix, so batches hit it first
        catalog.insert(
            "AFix".to_string(),
            ModDefinition {
                repo: "Lyall/AFix".to_string(),
                config_files: vec![],
                games,
            },
        );
        catalog
    }

    fn foo_game() -> Vec<GameRef> {
        vec![GameRef {
            name: Some("Foo".to_string()),
            steam_appid: FOO_APPID,
        }]
    }

    #[test]
    fn test_install_all_continues_after_bad_archive() {
        let fx = Fixture::new();
        let catalog = catalog_with_second_mod(foo_game());
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));
        releases.corrupt_repos.borrow_mut().push("Lyall/AFix".to_string());

        let report = fx.manager(&releases).install_all(&catalog, false);
        assert_eq!(report.installed, vec!["FooFix".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "AFix");
        assert!(report.failed[0].1.starts_with("Integrity check failed"));
        assert_eq!(fx.count_lines("[ERROR] AFix failed"), 1);
        assert_eq!(fs::read_dir(fx.data_dir.join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_update_all_continues_after_bad_archive() {
        let fx = Fixture::new();
        let catalog = catalog_with_second_mod(foo_game());
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));
        let manager = fx.manager(&releases);
        assert_eq!(manager.install_all(&catalog, false).installed.len(), 2);

        *releases.version.borrow_mut() = "v1.1".to_string();
        releases.corrupt_repos.borrow_mut().push("Lyall/AFix".to_string());
        let report = manager.update_all(&catalog, false).unwrap();

        assert_eq!(report.installed, vec!["FooFix".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "AFix");
        let mods = manager.installed().unwrap();
        assert_eq!(mods["AFix"].version, "v1.0");
        assert_eq!(mods["FooFix"].version, "v1.1");
        assert_eq!(fs::read_dir(fx.data_dir.join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_install_all_skips_mod_without_games() {
        let fx = Fixture::new();
        let catalog = catalog_with_second_mod(Vec::new());
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));

        let report = fx.manager(&releases).install_all(&catalog, false);
        assert_eq!(report.skipped, vec!["AFix".to_string()]);
        assert_eq!(report.installed, vec!["FooFix".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(fx.count_lines("[WARN] No games defined for mod AFix. Skipping."), 1);
    }

    #[test]
    fn test_update_requires_installed_mod() {
        let fx = Fixture::new();
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));

        let err = fx.manager(&releases).update("FooFix", &catalog(), false).unwrap_err();
        assert!(matches!(err, QuickFixError::NotInstalled(_)));
        assert_eq!(releases.downloads.get(), 0);
    }

    #[test]
    fn test_update_installs_newer_release() {
        let fx = Fixture::new();
        let releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));
        let manager = fx.manager(&releases);
        manager.install("FooFix", &catalog(), false).unwrap();

        let same = manager.update("FooFix", &catalog(), false).unwrap();
        assert_eq!(same, InstallOutcome::UpToDate { version: "v1.0".to_string() });

        *releases.version.borrow_mut() = "v1.1".to_string();
        let newer = manager.update("FooFix", &catalog(), false).unwrap();
        assert!(matches!(newer, InstallOutcome::Installed { ref version, .. } if version == "v1.1"));
        assert_eq!(manager.installed().unwrap()["FooFix"].version, "v1.1");
        assert_eq!(releases.downloads.get(), 2);
    }

    #[test]
    fn test_checksum_mismatch_aborts_install() {
        let fx = Fixture::new();
        let mut releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));
        releases.checksums = Some(format!("{}  Fix.zip\n", "0".repeat(64)));
        let manager = fx.manager(&releases);

        let err = manager.install("FooFix", &catalog(), false).unwrap_err();
        assert!(matches!(err, QuickFixError::Integrity(_)));
        assert!(!fx.game_dir.join("a.dll").exists());
        assert!(manager.installed().unwrap().is_empty());
        assert_eq!(fs::read_dir(fx.data_dir.join("tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_checksum_listing_without_archive_warns() {
        let fx = Fixture::new();
        let mut releases = FakeReleases::serving("v1.0", zip_bytes(&[("a.dll", "dll")]));
        releases.checksums = Some(format!("{}  Other.zip\n", "0".repeat(64)));

        fx.manager(&releases).install("FooFix", &catalog(), false).unwrap();
        assert_eq!(fx.count_lines("[WARN] Checksum file does not list Fix.zip"), 1);
    }

    #[test]
    fn test_unknown_mod_is_not_found() {
        let fx = Fixture::new();
        let releases = FakeReleases::serving("v1.0", Vec::new());
        let err = fx.manager(&releases).install("Nope", &catalog(), false).unwrap_err();
        assert!(matches!(err, QuickFixError::NotFound { what: "Mod", .. }));
    }

    #[test]
    fn test_find_config_files() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.game_dir.join("bin/scripts")).unwrap();
        fs::write(fx.game_dir.join("bin/scripts/foofix.ini"), "[A]\n").unwrap();
        let mut catalog = catalog();
        if let Some(def) = catalog.get_mut("FooFix") {
            def.config_files.push("Missing.ini".to_string());
        }
        let releases = FakeReleases::serving("v1.0", Vec::new());

        let lookups = fx.manager(&releases).find_config_files("FooFix", &catalog).unwrap();
        assert_eq!(lookups.len(), 2);
        assert_eq!(lookups[0].path, Some(fx.game_dir.join("bin/scripts/foofix.ini")));
        assert_eq!(lookups[1].file_name, "Missing.ini");
        assert_eq!(lookups[1].path, None);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let install = GameInstall {
            app_id: 7,
            name: Some("Manifest Name".to_string()),
            install_path: PathBuf::from("/games/x"),
        };
        let named = GameRef {
            name: Some("Catalog Name".to_string()),
            steam_appid: 7,
        };
        let bare = GameRef {
            name: None,
            steam_appid: 7,
        };
        assert_eq!(display_name(Some(&named), Some(&install), 7), "Catalog Name");
        assert_eq!(display_name(Some(&bare), Some(&install), 7), "Manifest Name");
        assert_eq!(display_name(Some(&bare), None, 7), "Steam App 7");
    }
}
