//! Game detection
//!
//! The lifecycle code only needs "where is app N installed?", so detection
//! sits behind the [`GameLocator`] trait. [`SteamLocator`] answers it from
//! the local Steam libraries.

mod steam;
pub mod vdf;

use std::path::PathBuf;

pub use steam::{SteamLocator, STEAM_DIR_ENV};

/// A located game installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInstall {
    pub app_id: u32,
    /// Name from the Steam manifest, if it has one
    pub name: Option<String>,
    pub install_path: PathBuf,
}

pub trait GameLocator {
    fn locate(&self, app_id: u32) -> Option<GameInstall>;

    fn find_install_path(&self, app_id: u32) -> Option<PathBuf> {
        self.locate(app_id).map(|game| game.install_path)
    }
}
