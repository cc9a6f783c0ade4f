//! Blocking HTTP helpers with bounded retry
//!
//! Every network call in QuickFix goes through [`HttpClient`], which maps
//! responses onto the error taxonomy and retries transient failures with
//! exponential backoff.

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::time::Duration;

use crate::config::Settings;
use crate::error::{QuickFixError, Result};
use crate::logging::Logger;

const USER_AGENT: &str = concat!("QuickFix/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    metadata_timeout: Duration,
    download_timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
    log: Logger,
}

impl HttpClient {
    pub fn new(settings: &Settings, log: Logger) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
            metadata_timeout: settings.metadata_timeout(),
            download_timeout: settings.download_timeout(),
            max_attempts: settings.max_attempts.max(1),
            backoff_base: Duration::from_secs(1),
            log,
        }
    }

    /// GET a JSON document, optionally sending an `Authorization` header
    pub fn get_json<T: DeserializeOwned>(&self, url: &str, authorization: Option<&str>) -> Result<T> {
        self.with_retries(url, || {
            let response = self.call(url, authorization, self.metadata_timeout)?;
            let value = response.into_json::<T>()?;
            Ok(value)
        })
    }

    pub fn get_text(&self, url: &str) -> Result<String> {
        self.with_retries(url, || {
            let response = self.call(url, None, self.metadata_timeout)?;
            Ok(response.into_string()?)
        })
    }

    /// Stream `url` into `file`, truncating it before every attempt.
    /// Returns the number of bytes written.
    pub fn download_to(&self, url: &str, file: &mut File) -> Result<u64> {
        self.with_retries(url, || {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;

            let response = self.call(url, None, self.download_timeout)?;
            let mut reader = response.into_reader();
            let written = std::io::copy(&mut reader, file).map_err(|e| QuickFixError::Transient {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            file.sync_all()?;
            Ok(written)
        })
    }

    fn call(&self, url: &str, authorization: Option<&str>, timeout: Duration) -> Result<ureq::Response> {
        let mut request = self.agent.get(url).timeout(timeout);
        if let Some(auth) = authorization {
            self.log.debug(&format!("Authenticated request: {}", url));
            request = request.set("Authorization", auth);
        } else {
            self.log.debug(&format!("Public request: {}", url));
        }

        match request.call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, _)) => Err(classify_status(url, status)),
            Err(ureq::Error::Transport(transport)) => Err(QuickFixError::Transient {
                url: url.to_string(),
                reason: transport.to_string(),
            }),
        }
    }

    fn with_retries<T>(&self, url: &str, mut attempt_fn: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match attempt_fn() {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = backoff_delay(self.backoff_base, attempt);
                    self.log.warning(&format!(
                        "Request failed (attempt {}/{}), retrying in {}s: {}",
                        attempt,
                        self.max_attempts,
                        delay.as_secs(),
                        e
                    ));
                    self.log.debug(&format!("Retrying {}", url));
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Map an HTTP error status onto the error taxonomy
pub fn classify_status(url: &str, status: u16) -> QuickFixError {
    match status {
        404 => QuickFixError::not_found("Resource", url),
        429 | 500..=599 => QuickFixError::Transient {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
        },
        _ => QuickFixError::Http {
            url: url.to_string(),
            status,
        },
    }
}

/// Delay before retry number `attempt` (1-based): base, 2×base, 4×base, ...
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}
