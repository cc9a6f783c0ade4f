//! QuickFix - mod manager for Steam game fixes
//!
//! Library crate with the install/update/uninstall machinery; the `quickfix`
//! binary is a thin CLI over [`manager::ModManager`].

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod game_finder;
pub mod http;
pub mod ledger;
pub mod logging;
pub mod manager;
pub mod marker;
pub mod paths;
pub mod releases;
pub mod utils;

pub use error::{QuickFixError, Result};
