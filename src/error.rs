//! Error taxonomy shared by every QuickFix operation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuickFixError {
    /// Catalog entry, repository, release or archive asset is absent
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    #[error("Could not find an install path for {game} (Steam app {app_id})")]
    GameNotFound { app_id: u32, game: String },

    /// Network failure or rate limiting that survived the retry budget
    #[error("Temporary failure talking to {url}: {reason}")]
    Transient { url: String, reason: String },

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Could not merge config file {path}: {reason}")]
    ConfigMerge { path: String, reason: String },

    #[error("Mod {0} is not installed")]
    NotInstalled(String),

    #[error("Request to {url} failed with HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("Could not determine the QuickFix data directory")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl QuickFixError {
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        QuickFixError::NotFound {
            what,
            name: name.into(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, QuickFixError::Transient { .. })
    }
}

pub type Result<T> = std::result::Result<T, QuickFixError>;
