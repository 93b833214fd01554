//! Source loading with fixed-delay retries
//!
//! A location is either an `http(s)://` URL or a local path (`file://` is
//! accepted too). Bodies may be gzip-compressed. A source that stays
//! unavailable is reported, never silently turned into an empty list.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{SourcePolicy, SourcesConfig};
use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::models::{SourceReport, SourceStatus};
use crate::utils::{DecompressionService, UrlUtils};

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Raw bytes of the location, possibly compressed
    async fn fetch(&self, location: &str) -> SourceResult<Vec<u8>>;
}

/// Fetches URLs with reqwest and everything else from disk
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    client: Client,
    request_timeout: Duration,
}

impl DefaultFetcher {
    pub fn new(config: &SourcesConfig, user_agent: &str) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build source HTTP client: {e}")))?;
        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }

    async fn fetch_url(&self, url: &str) -> SourceResult<Vec<u8>> {
        let safe_url = UrlUtils::obfuscate_credentials(url);
        debug!("Fetching playlist from: {}", safe_url);

        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| SourceError::request(&safe_url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url: safe_url,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::request(&safe_url, e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn fetch_file(&self, path: &str) -> SourceResult<Vec<u8>> {
        debug!("Reading playlist from file: {}", path);
        tokio::fs::read(path).await.map_err(|e| SourceError::File {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, location: &str) -> SourceResult<Vec<u8>> {
        if UrlUtils::is_http(location) {
            self.fetch_url(location).await
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            self.fetch_file(path).await
        }
    }
}

/// Decoded playlist text of one location
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub location: String,
    pub text: String,
    /// Trusted sources bypass probing
    pub trusted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SourceLoad {
    pub sources: Vec<LoadedSource>,
    pub reports: Vec<SourceReport>,
}

pub struct SourceLoader {
    fetcher: Arc<dyn SourceFetcher>,
    attempts: u32,
    retry_delay: Duration,
    policy: SourcePolicy,
}

/// Network-level failures are worth another try; a body we could not use
/// will not get better
fn is_retryable(err: &SourceError) -> bool {
    matches!(err, SourceError::Request { .. } | SourceError::Http { .. })
}

impl SourceLoader {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, config: &SourcesConfig) -> Self {
        Self {
            fetcher,
            attempts: config.fetch_attempts.max(1),
            retry_delay: config.retry_delay,
            policy: config.policy,
        }
    }

    pub fn from_config(config: &SourcesConfig, user_agent: &str) -> AppResult<Self> {
        Ok(Self::new(
            Arc::new(DefaultFetcher::new(config, user_agent)?),
            config,
        ))
    }

    async fn fetch_text(&self, location: &str) -> SourceResult<String> {
        let bytes = self.fetcher.fetch(location).await?;
        let text = DecompressionService::decode_text(bytes, location)?;
        if text.trim().is_empty() {
            return Err(SourceError::Empty {
                location: UrlUtils::obfuscate_credentials(location),
            });
        }
        Ok(text)
    }

    /// Load one location; returns the outcome and the attempts it took
    pub async fn load(&self, location: &str) -> (SourceResult<String>, u32) {
        let safe_location = UrlUtils::obfuscate_credentials(location);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.fetch_text(location).await {
                Ok(text) => {
                    if attempt > 1 {
                        debug!("Loaded {} on attempt {}/{}", safe_location, attempt, self.attempts);
                    }
                    return (Ok(text), attempt);
                }
                Err(err) => err,
            };

            if !is_retryable(&err) {
                return (Err(err), attempt);
            }
            if attempt >= self.attempts {
                return (
                    Err(SourceError::Unavailable {
                        location: safe_location,
                        attempts: attempt,
                        last_error: err.to_string(),
                    }),
                    attempt,
                );
            }

            warn!(
                "Fetch attempt {}/{} for {} failed: {}; retrying in {:?}",
                attempt, self.attempts, safe_location, err, self.retry_delay
            );
            sleep(self.retry_delay).await;
        }
    }

    /// Load checked sources, then trusted ones, honouring the failure policy
    pub async fn load_all(&self, checked: &[String], trusted: &[String]) -> AppResult<SourceLoad> {
        let mut load = SourceLoad::default();

        let locations = checked
            .iter()
            .map(|l| (l, false))
            .chain(trusted.iter().map(|l| (l, true)));

        for (location, is_trusted) in locations {
            let safe_location = UrlUtils::obfuscate_credentials(location);
            let (result, attempts) = self.load(location).await;

            match result {
                Ok(text) => {
                    let channels = text.lines().filter(|l| l.trim_start().starts_with("#EXTINF")).count();
                    info!("Loaded {} ({} entries)", safe_location, channels);
                    load.reports.push(SourceReport {
                        location: safe_location,
                        attempts,
                        trusted: is_trusted,
                        status: SourceStatus::Loaded { channels },
                    });
                    load.sources.push(LoadedSource {
                        location: location.clone(),
                        text,
                        trusted: is_trusted,
                    });
                }
                Err(err) => {
                    if self.policy == SourcePolicy::FailFast {
                        return Err(AppError::Source(err));
                    }
                    warn!("Skipping unavailable source {}: {}", safe_location, err);
                    load.reports.push(SourceReport {
                        location: safe_location,
                        attempts,
                        trusted: is_trusted,
                        status: SourceStatus::Unavailable {
                            error: err.to_string(),
                        },
                    });
                }
            }
        }

        Ok(load)
    }
}
