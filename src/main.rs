//! QuickFix command-line front end

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use quickfix::catalog::{Catalog, CatalogCache, RemoteCatalog};
use quickfix::config::Settings;
use quickfix::game_finder::SteamLocator;
use quickfix::http::HttpClient;
use quickfix::ledger::Ledger;
use quickfix::logging::Logger;
use quickfix::manager::{BatchReport, InstallOutcome, ModManager};
use quickfix::paths::AppPaths;
use quickfix::releases::HostReleaseSource;
use quickfix::utils::open_path;
use quickfix::Result;

/// Install, update and remove community fixes for Steam games
#[derive(Parser, Debug)]
#[command(name = "quickfix", author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Print debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install a mod, or every mod whose game is installed
    Install {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        mod_id: Option<String>,

        #[arg(long)]
        all: bool,

        /// Reinstall even when the installed version is current
        #[arg(short, long)]
        force: bool,
    },
    /// Update an installed mod, or every installed mod
    Update {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        mod_id: Option<String>,

        #[arg(long)]
        all: bool,

        /// Reinstall even when the installed version is current
        #[arg(short, long)]
        force: bool,
    },
    /// Remove an installed mod and the files it placed
    Uninstall { mod_id: String },
    /// List every mod in the catalog
    ListMods,
    /// List installed mods and their versions
    ListInstalled,
    /// Refresh the mod catalog now
    UpdateCache,
    /// Open a mod's config files with the default editor
    OpenConfig { mod_id: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::from_env() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut settings = Settings::load(&paths, &Logger::console(cli.debug));
    settings.debug |= cli.debug;

    let log = Logger::with_log_dir(settings.debug, &paths.logs_dir());
    log.debug(&format!("Data directory: {}", paths.root().display()));

    // Per-mod failures are reported, not turned into an exit status
    if let Err(e) = run(cli.command, &paths, &settings, &log) {
        log.error(&e.to_string());
    }
    ExitCode::SUCCESS
}

fn run(command: Command, paths: &AppPaths, settings: &Settings, log: &Logger) -> Result<()> {
    let http = HttpClient::new(settings, log.clone());
    let remote = RemoteCatalog::new(settings.catalog_url.clone(), http.clone(), log.clone());
    let cache = CatalogCache::new(paths.clone(), settings.cache_ttl_hours, log.clone());

    let ledger = Ledger::new(paths.ledger_file(), log.clone());

    // Commands that never touch a game directory
    match command {
        Command::UpdateCache => {
            let catalog = cache.get(&remote, true)?;
            log.info(&format!("Mod catalog updated ({} mods).", catalog.len()));
            return Ok(());
        }
        Command::ListMods => {
            list_mods(&cache.get(&remote, false)?);
            return Ok(());
        }
        Command::ListInstalled => {
            list_installed(&ledger, log)?;
            return Ok(());
        }
        _ => {}
    }

    let releases = HostReleaseSource::new(settings, http, log.clone());
    let steam = SteamLocator::detect(log.clone());
    let manager = ModManager::new(&releases, &steam, ledger, settings, paths.tmp_dir(), log.clone());

    match command {
        Command::Install { mod_id, force, .. } => {
            let catalog = cache.get(&remote, false)?;
            match mod_id {
                Some(mod_id) => report_install(&mod_id, manager.install(&mod_id, &catalog, force)?, log),
                None => report_batch(&manager.install_all(&catalog, force), log),
            }
        }
        Command::Update { mod_id, force, .. } => {
            let catalog = cache.get(&remote, false)?;
            match mod_id {
                Some(mod_id) => report_install(&mod_id, manager.update(&mod_id, &catalog, force)?, log),
                None => report_batch(&manager.update_all(&catalog, force)?, log),
            }
        }
        Command::Uninstall { mod_id } => {
            manager.uninstall(&mod_id)?;
        }
        Command::OpenConfig { mod_id } => {
            let catalog = cache.get(&remote, false)?;
            for lookup in manager.find_config_files(&mod_id, &catalog)? {
                match lookup.path {
                    Some(path) => {
                        log.info(&format!("Opening config file: {}", path.display()));
                        if let Err(e) = open_path(&path) {
                            log.error(&format!("Could not open {}: {}", path.display(), e));
                        }
                    }
                    None => log.warning(&format!(
                        "Could not find {} for {}.",
                        lookup.file_name, lookup.game
                    )),
                }
            }
            log.info(&format!("Finished processing config files for {}.", mod_id));
        }
        Command::UpdateCache | Command::ListMods | Command::ListInstalled => {}
    }

    Ok(())
}

fn report_install(mod_id: &str, outcome: InstallOutcome, log: &Logger) {
    match outcome {
        InstallOutcome::Installed { version, game, files } => log.info(&format!(
            "{} {} installed for {} ({} files).",
            mod_id, version, game, files
        )),
        InstallOutcome::UpToDate { version } => {
            log.info(&format!("{} is already at {}.", mod_id, version))
        }
    }
}

fn report_batch(report: &BatchReport, log: &Logger) {
    log.info(&format!("Done: {}.", report.summary()));
    for (mod_id, reason) in &report.failed {
        log.warning(&format!("{}: {}", mod_id, reason));
    }
}

fn list_installed(ledger: &Ledger, log: &Logger) -> Result<()> {
    let mods = ledger.load()?;
    if mods.is_empty() {
        log.info("No mods are currently installed.");
        return Ok(());
    }

    println!("Installed mods:");
    for (mod_id, entry) in &mods {
        let status = if entry.is_tracked() { "uninstallable" } else { "tracking only" };
        println!("- {}: {} ({})", mod_id, entry.version, status);
    }
    Ok(())
}

fn list_mods(catalog: &Catalog) {
    println!("Available mods:");
    for (mod_id, definition) in catalog {
        println!("- {} ({})", mod_id, definition.repo);
        if !definition.config_files.is_empty() {
            println!("    config: {}", definition.config_files.join(", "));
        }
        for game in &definition.games {
            match &game.name {
                Some(name) => println!("    game: {} (Steam app {})", name, game.steam_appid),
                None => println!("    game: Steam app {}", game.steam_appid),
            }
        }
    }
}
