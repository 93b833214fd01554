//! Protocol-agnostic stream analysis via ffprobe
//!
//! Used as the last resort of the liveness probe when the protocol specific
//! checks could not reach a verdict.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::FallbackConfig;
use crate::errors::{ProbeError, ProbeResult};
use crate::models::StreamHeaders;
use crate::utils::UrlUtils;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StreamInfo {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub codec_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FormatInfo {
    format_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AnalyzerError {
    code: Option<i32>,
    string: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<StreamInfo>,
    format: Option<FormatInfo>,
    error: Option<AnalyzerError>,
}

/// What the analyzer found in a stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub streams: Vec<StreamInfo>,
    pub format_name: Option<String>,
}

impl AnalysisReport {
    pub fn has_streams(&self) -> bool {
        !self.streams.is_empty()
    }
}

#[async_trait]
pub trait StreamAnalyzer: Send + Sync {
    async fn analyze(&self, url: &str, headers: &StreamHeaders) -> ProbeResult<AnalysisReport>;
}

pub struct FfprobeAnalyzer {
    ffprobe_command: String,
    timeout: Duration,
}

impl FfprobeAnalyzer {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            ffprobe_command: config.ffprobe_command.clone(),
            timeout: config.timeout,
        }
    }

    fn build_command(&self, url: &str, headers: &StreamHeaders) -> Command {
        let mut cmd = Command::new(&self.ffprobe_command);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_error",
            "-show_entries",
            "stream=index,codec_type,codec_name:format=format_name",
            "-analyzeduration",
            "2000000",
            "-probesize",
            "1000000",
        ]);

        if let Some(user_agent) = &headers.user_agent {
            cmd.args(["-user_agent", user_agent]);
        }
        let extra: String = headers
            .pairs()
            .filter(|(name, _)| *name != "User-Agent")
            .map(|(name, value)| format!("{name}: {value}\r\n"))
            .collect();
        if !extra.is_empty() {
            cmd.args(["-headers", &extra]);
        }

        cmd.arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl StreamAnalyzer for FfprobeAnalyzer {
    async fn analyze(&self, url: &str, headers: &StreamHeaders) -> ProbeResult<AnalysisReport> {
        debug!("Analyzing stream with ffprobe: {}", UrlUtils::obfuscate_credentials(url));

        let mut cmd = self.build_command(url, headers);
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(|e| ProbeError::Connect(format!("Failed to execute ffprobe: {e}")))?;

        parse_analysis(&output.stdout)
    }
}

/// Parse ffprobe JSON output. A reported error with no streams is an error;
/// empty output is an empty report.
pub fn parse_analysis(stdout: &[u8]) -> ProbeResult<AnalysisReport> {
    let text = String::from_utf8_lossy(stdout);
    if text.trim().is_empty() {
        return Ok(AnalysisReport::default());
    }

    let parsed: FfprobeOutput = serde_json::from_str(&text)
        .map_err(|e| ProbeError::Body(format!("Failed to parse ffprobe output: {e}")))?;

    if parsed.streams.is_empty()
        && let Some(error) = parsed.error
    {
        return Err(ProbeError::Connect(format!(
            "ffprobe error: {} (code: {:?})",
            error.string.as_deref().unwrap_or("unknown"),
            error.code
        )));
    }

    Ok(AnalysisReport {
        streams: parsed.streams,
        format_name: parsed.format.and_then(|f| f.format_name),
    })
}
