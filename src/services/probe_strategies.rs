//! Liveness probe strategies
//!
//! Each strategy looks at a stream and answers reachable, unreachable or
//! "can't tell". The prober runs them in order and stops at the first answer
//! that is not [`ProbeVerdict::Inconclusive`].

use async_trait::async_trait;
use serde::Serialize;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use super::http_transport::HttpTransport;
use super::stream_analyzer::StreamAnalyzer;
use crate::config::ProbeConfig;
use crate::errors::{ProbeError, ProbeResult};
use crate::models::{ChannelRecord, StreamHeaders};
use crate::utils::UrlUtils;

const MANIFEST_MARKER: &[u8] = b"#EXTM3U";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Content types that are served as raw media even though they are not
/// `video/*` or `audio/*`
const BINARY_CONTENT_TYPES: &[&str] = &[
    "application/octet-stream",
    "binary/octet-stream",
    "application/mp2t",
    "application/mp4",
    "application/x-flv",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeVerdict {
    Reachable,
    Unreachable,
    Inconclusive,
}

/// What a strategy gets to look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub url: String,
    pub headers: StreamHeaders,
    /// Attempt budget for strategies that retry
    pub max_attempts: u32,
}

impl ProbeTarget {
    pub fn new<S: Into<String>>(url: S, headers: StreamHeaders, max_attempts: u32) -> Self {
        Self {
            url: url.into(),
            headers,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn for_record(record: &ChannelRecord, max_attempts: u32) -> Self {
        Self::new(record.stream_url.clone(), record.headers.clone(), max_attempts)
    }
}

#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, target: &ProbeTarget) -> ProbeVerdict;
}

/// Rejects URLs containing a blocked substring without touching the network
pub struct BlocklistStrategy {
    blocked: Vec<String>,
}

impl BlocklistStrategy {
    pub fn new<I, S>(blocked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked: blocked
                .into_iter()
                .map(Into::into)
                .filter(|b: &String| !b.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl ProbeStrategy for BlocklistStrategy {
    fn name(&self) -> &'static str {
        "blocklist"
    }

    async fn evaluate(&self, target: &ProbeTarget) -> ProbeVerdict {
        match self.blocked.iter().find(|b| target.url.contains(b.as_str())) {
            Some(hit) => {
                debug!(
                    "Blocked stream {} (matches '{}')",
                    UrlUtils::obfuscate_credentials(&target.url),
                    hit
                );
                ProbeVerdict::Unreachable
            }
            None => ProbeVerdict::Inconclusive,
        }
    }
}

/// Raw TCP connect check for push-media schemes (RTMP and friends).
///
/// The connect is blocking, so every attempt runs on tokio's blocking pool.
pub struct PushMediaStrategy {
    schemes: Vec<String>,
    default_port: u16,
    attempt_timeout: Duration,
}

impl PushMediaStrategy {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            schemes: config
                .push_schemes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            default_port: config.push_default_port,
            attempt_timeout: config.attempt_timeout,
        }
    }

    async fn connect_once(&self, host: &str, port: u16) -> ProbeResult<()> {
        let host = host.to_string();
        let connect_timeout = self.attempt_timeout;

        let handle = tokio::task::spawn_blocking(move || -> ProbeResult<()> {
            let addrs = (host.as_str(), port)
                .to_socket_addrs()
                .map_err(|e| ProbeError::Connect(format!("{host}:{port}: {e}")))?;

            let mut last_error = ProbeError::Connect(format!("{host}:{port}: no addresses"));
            for addr in addrs {
                match TcpStream::connect_timeout(&addr, connect_timeout) {
                    Ok(_) => return Ok(()),
                    Err(e) => last_error = ProbeError::Connect(format!("{addr}: {e}")),
                }
            }
            Err(last_error)
        });

        // name resolution is not covered by connect_timeout
        match timeout(connect_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ProbeError::Connect(join_error.to_string())),
            Err(_) => Err(ProbeError::Timeout(connect_timeout)),
        }
    }
}

#[async_trait]
impl ProbeStrategy for PushMediaStrategy {
    fn name(&self) -> &'static str {
        "push_media"
    }

    async fn evaluate(&self, target: &ProbeTarget) -> ProbeVerdict {
        let Some(scheme) = UrlUtils::scheme(&target.url) else {
            return ProbeVerdict::Inconclusive;
        };
        if !self.schemes.contains(&scheme) {
            return ProbeVerdict::Inconclusive;
        }

        let safe_url = UrlUtils::obfuscate_credentials(&target.url);
        let Some((host, port)) = UrlUtils::host_port(&target.url, self.default_port) else {
            debug!("No host in push-media URL {}", safe_url);
            return ProbeVerdict::Unreachable;
        };

        for attempt in 1..=target.max_attempts {
            match self.connect_once(&host, port).await {
                Ok(()) => {
                    debug!(
                        "Attempt {}/{} for {} - TCP connect ok",
                        attempt, target.max_attempts, safe_url
                    );
                    return ProbeVerdict::Reachable;
                }
                Err(e) => debug!(
                    "Attempt {}/{} for {} - {}",
                    attempt, target.max_attempts, safe_url, e
                ),
            }
        }
        ProbeVerdict::Unreachable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentClass {
    Manifest,
    Media,
    /// No content type at all
    Undeclared,
    Other,
}

fn classify_content(url: &str, content_type: Option<&str>) -> ContentClass {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if UrlUtils::has_manifest_extension(url) || mime.contains("mpegurl") {
        ContentClass::Manifest
    } else if mime.is_empty() {
        ContentClass::Undeclared
    } else if mime.starts_with("video/")
        || mime.starts_with("audio/")
        || BINARY_CONTENT_TYPES.contains(&mime.as_str())
    {
        ContentClass::Media
    } else {
        ContentClass::Other
    }
}

fn starts_with_manifest_marker(prefix: &[u8]) -> bool {
    let body = prefix.strip_prefix(UTF8_BOM).unwrap_or(prefix);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    body[start..].starts_with(MANIFEST_MARKER)
}

/// HTTP(S) check: status, then content heuristics, retried up to the
/// attempt budget with no delay in between
pub struct HttpStrategy {
    transport: Arc<dyn HttpTransport>,
    accepted_statuses: Vec<u16>,
    attempt_timeout: Duration,
    manifest_read_limit: usize,
    media_read_limit: usize,
}

impl HttpStrategy {
    pub fn new(config: &ProbeConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            accepted_statuses: config.accepted_statuses.clone(),
            attempt_timeout: config.attempt_timeout,
            manifest_read_limit: config.manifest_read_limit,
            media_read_limit: config.media_read_limit,
        }
    }

    async fn attempt(&self, target: &ProbeTarget) -> ProbeResult<bool> {
        let mut response = self.transport.open(&target.url, &target.headers).await?;

        let status = response.status();
        if !self.accepted_statuses.contains(&status) {
            debug!("Status {} not accepted", status);
            return Ok(false);
        }

        let content_type = response.content_type();
        match classify_content(&target.url, content_type.as_deref()) {
            ContentClass::Manifest => {
                let prefix = response.read_prefix(self.manifest_read_limit).await?;
                Ok(starts_with_manifest_marker(&prefix))
            }
            ContentClass::Media => {
                // any bytes at all count, playlist marker or raw media
                let prefix = response.read_prefix(self.media_read_limit).await?;
                Ok(!prefix.is_empty())
            }
            // Optimistic: a missing content type on an accepted status passes.
            // Likely a source of false positives.
            ContentClass::Undeclared => Ok(true),
            ContentClass::Other => {
                debug!("Unexpected content type {:?}", content_type);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ProbeStrategy for HttpStrategy {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn evaluate(&self, target: &ProbeTarget) -> ProbeVerdict {
        if !UrlUtils::is_http(&target.url) {
            return ProbeVerdict::Inconclusive;
        }

        let safe_url = UrlUtils::obfuscate_credentials(&target.url);
        for attempt in 1..=target.max_attempts {
            match timeout(self.attempt_timeout, self.attempt(target)).await {
                Ok(Ok(true)) => {
                    debug!("Attempt {}/{} for {} - working", attempt, target.max_attempts, safe_url);
                    return ProbeVerdict::Reachable;
                }
                Ok(Ok(false)) => {
                    debug!("Attempt {}/{} for {} - rejected", attempt, target.max_attempts, safe_url)
                }
                Ok(Err(e)) => {
                    debug!("Attempt {}/{} for {} - {}", attempt, target.max_attempts, safe_url, e)
                }
                Err(_) => debug!(
                    "Attempt {}/{} for {} - {}",
                    attempt,
                    target.max_attempts,
                    safe_url,
                    ProbeError::Timeout(self.attempt_timeout)
                ),
            }
        }
        ProbeVerdict::Inconclusive
    }
}

/// Last resort: ask a stream analyzer whether anything playable is there
pub struct FallbackStrategy {
    analyzer: Arc<dyn StreamAnalyzer>,
}

impl FallbackStrategy {
    pub fn new(analyzer: Arc<dyn StreamAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl ProbeStrategy for FallbackStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn evaluate(&self, target: &ProbeTarget) -> ProbeVerdict {
        match self.analyzer.analyze(&target.url, &target.headers).await {
            Ok(report) if report.has_streams() => ProbeVerdict::Reachable,
            Ok(_) => ProbeVerdict::Unreachable,
            Err(e) => {
                debug!(
                    "Fallback analysis failed for {}: {}",
                    UrlUtils::obfuscate_credentials(&target.url),
                    e
                );
                ProbeVerdict::Unreachable
            }
        }
    }
}
