//! Release lookup against the repository host's "latest release" API

use serde::Deserialize;
use std::fs::File;

use crate::config::{ReleaseHost, Settings};
use crate::error::{QuickFixError, Result};
use crate::http::HttpClient;
use crate::logging::Logger;

pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Checksum asset names recognised next to an archive (compared lowercase)
pub const CHECKSUM_ASSET_NAMES: &[&str] = &["sha256sum.txt", "sha256sums.txt", "checksums.txt"];

/// Release metadata as returned by GitHub and Gitea/Forgejo (Codeberg)
#[derive(Deserialize, Debug, Clone)]
pub struct ReleasePayload {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// The parts of the latest release QuickFix acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: String,
    pub archive_name: String,
    pub download_url: String,
    pub checksum_url: Option<String>,
}

impl Release {
    /// Pick the first `.zip` asset as the download and the checksum asset (if
    /// any) as the integrity reference.
    pub fn from_payload(repo: &str, payload: ReleasePayload) -> Result<Self> {
        let archive = payload
            .assets
            .iter()
            .find(|a| a.name.ends_with(ARCHIVE_EXTENSION))
            .ok_or_else(|| {
                QuickFixError::not_found("Archive asset", format!("{}@{}", repo, payload.tag_name))
            })?;

        let checksum_url = payload
            .assets
            .iter()
            .find(|a| CHECKSUM_ASSET_NAMES.contains(&a.name.to_lowercase().as_str()))
            .map(|a| a.browser_download_url.clone());

        Ok(Self {
            version: payload.tag_name.clone(),
            archive_name: archive.name.clone(),
            download_url: archive.browser_download_url.clone(),
            checksum_url,
        })
    }
}

/// Where releases and their files come from
pub trait ReleaseSource {
    fn latest_release(&self, repo: &str) -> Result<Release>;

    /// Stream `url` into `dest`, returning the byte count
    fn download(&self, url: &str, dest: &mut File) -> Result<u64>;

    fn fetch_text(&self, url: &str) -> Result<String>;
}

/// [`ReleaseSource`] backed by the configured forge's REST API
pub struct HostReleaseSource {
    host: ReleaseHost,
    token: Option<String>,
    http: HttpClient,
    log: Logger,
}

impl HostReleaseSource {
    pub fn new(settings: &Settings, http: HttpClient, log: Logger) -> Self {
        let host = settings.release_host;
        let token = std::env::var(host.token_env()).ok().filter(|t| !t.is_empty());
        Self { host, token, http, log }
    }
}

impl ReleaseSource for HostReleaseSource {
    fn latest_release(&self, repo: &str) -> Result<Release> {
        let url = self.host.latest_release_url(repo);
        let auth = self.token.as_deref().map(|t| self.host.authorization(t));

        let payload: ReleasePayload = match self.http.get_json(&url, auth.as_deref()) {
            Ok(payload) => payload,
            Err(QuickFixError::NotFound { .. }) => {
                return Err(QuickFixError::not_found("Release", repo));
            }
            Err(e) => return Err(e),
        };

        let release = Release::from_payload(repo, payload)?;
        self.log.debug(&format!(
            "Latest release of {}: {} ({})",
            repo, release.version, release.download_url
        ));
        Ok(release)
    }

    fn download(&self, url: &str, dest: &mut File) -> Result<u64> {
        self.http.download_to(url, dest)
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        self.http.get_text(url)
    }
}
