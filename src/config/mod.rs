use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub mod defaults;
pub mod duration_serde;
pub mod tables;

use crate::errors::{AppError, AppResult};
use crate::ingestor::NameCleaner;
use crate::output::OutputFormat;
use defaults::*;
pub use tables::StaticTables;

/// Environment prefix for overrides, e.g. `M3U_MERGE_SCHEDULER__MAX_CONCURRENT_PROBES=10`
pub const ENV_PREFIX: &str = "M3U_MERGE_";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeConfig,
    pub scheduler: SchedulerConfig,
    pub sources: SourcesConfig,
    pub output: OutputConfig,
    pub tables: StaticTables,
}

/// Liveness probe tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Attempts per channel for both the HTTP and the push-media checks
    pub max_attempts: u32,
    /// Timeout of a single primary attempt (request + bounded body read)
    #[serde(with = "duration_serde")]
    pub attempt_timeout: Duration,
    /// Status codes that make a response worth inspecting
    pub accepted_statuses: Vec<u16>,
    /// Bytes read from a manifest body when checking for the marker
    pub manifest_read_limit: usize,
    /// Bytes read from a raw media body
    pub media_read_limit: usize,
    /// URL schemes checked with a raw TCP connect instead of HTTP
    pub push_schemes: Vec<String>,
    /// Port used for push-media URLs that do not name one
    pub push_default_port: u16,
    /// User agent sent when the channel carries no override
    pub default_user_agent: String,
    pub fallback: FallbackConfig,
}

/// Secondary protocol-agnostic analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    /// Can be a full path (/usr/bin/ffprobe) or a command name resolved via $PATH
    pub ffprobe_command: String,
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Hard cap on probes performing network I/O at the same time
    pub max_concurrent_probes: usize,
}

/// What to do with a location that stays unavailable after all fetch attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourcePolicy {
    /// Abort the run
    FailFast,
    /// Report the source and continue with the rest
    SkipUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub fetch_attempts: u32,
    /// Fixed delay between fetch attempts (no backoff)
    #[serde(with = "duration_serde")]
    pub retry_delay: Duration,
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    pub policy: SourcePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Replaces the header line taken from the first source
    pub header: Option<String>,
    pub targets: Vec<OutputTarget>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_PROBE_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            accepted_statuses: DEFAULT_ACCEPTED_STATUSES.to_vec(),
            manifest_read_limit: DEFAULT_MANIFEST_READ_LIMIT,
            media_read_limit: DEFAULT_MEDIA_READ_LIMIT,
            push_schemes: DEFAULT_PUSH_SCHEMES.iter().map(|s| s.to_string()).collect(),
            push_default_port: DEFAULT_PUSH_PORT,
            default_user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            fallback: FallbackConfig::default(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffprobe_command: DEFAULT_FFPROBE_COMMAND.to_string(),
            timeout: DEFAULT_FALLBACK_TIMEOUT,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            retry_delay: DEFAULT_FETCH_RETRY_DELAY,
            request_timeout: DEFAULT_FETCH_TIMEOUT,
            policy: SourcePolicy::SkipUnavailable,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            header: None,
            targets: vec![OutputTarget {
                path: PathBuf::from(DEFAULT_OUTPUT_PATH),
                format: OutputFormat::M3u,
            }],
        }
    }
}

impl Config {
    /// Load configuration: compiled defaults, then the optional TOML file, then
    /// `M3U_MERGE_*` environment variables.
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(AppError::configuration(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
            info!("Configuration loaded from: {}", path.display());
        } else {
            debug!("No config file given, using defaults and environment");
        }

        let config: Config = figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.probe.max_attempts == 0 {
            return Err(AppError::configuration("probe.max_attempts must be at least 1"));
        }
        if self.scheduler.max_concurrent_probes == 0 {
            return Err(AppError::configuration(
                "scheduler.max_concurrent_probes must be at least 1",
            ));
        }
        if self.sources.fetch_attempts == 0 {
            return Err(AppError::configuration("sources.fetch_attempts must be at least 1"));
        }
        if self.probe.accepted_statuses.is_empty() {
            return Err(AppError::configuration("probe.accepted_statuses must not be empty"));
        }
        if self.tables.default_category.trim().is_empty() {
            return Err(AppError::configuration("tables.default_category must not be empty"));
        }
        NameCleaner::new(self.tables.name_cleanup_patterns.as_slice())?;
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::configuration(format!("Failed to render config: {e}")))
    }
}
