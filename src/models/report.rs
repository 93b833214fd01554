//! Diagnostics produced by a run
//!
//! Channels that fail a probe silently disappear from the merged playlist;
//! these records are where an operator can find out why.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::errors::AppResult;
use crate::output::OutputFormat;

/// What happened to a channel in a checked merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDisposition {
    Kept,
    Unreachable,
    /// Reachable, but an earlier record already claimed the stream URL
    Duplicate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelDiagnostic {
    /// Stream URL with credentials masked
    pub url: String,
    pub name: String,
    pub tvg_id: Option<String>,
    pub reachable: bool,
    /// Name of the strategy that produced the verdict, if any did
    pub decided_by: Option<String>,
    pub elapsed_ms: u64,
    pub disposition: ChannelDisposition,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub total: usize,
    pub kept: usize,
    pub unreachable: usize,
    pub duplicates: usize,
    pub channels: Vec<ChannelDiagnostic>,
}

impl MergeReport {
    pub fn push(&mut self, diagnostic: ChannelDiagnostic) {
        self.total += 1;
        match diagnostic.disposition {
            ChannelDisposition::Kept => self.kept += 1,
            ChannelDisposition::Unreachable => self.unreachable += 1,
            ChannelDisposition::Duplicate => self.duplicates += 1,
        }
        self.channels.push(diagnostic);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Loaded { channels: usize },
    Unavailable { error: String },
}

/// Outcome of loading one playlist location
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub location: String,
    pub attempts: u32,
    pub trusted: bool,
    #[serde(flatten)]
    pub status: SourceStatus,
}

impl SourceReport {
    pub fn is_loaded(&self) -> bool {
        matches!(self.status, SourceStatus::Loaded { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputSummary {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub channels: usize,
}

/// Everything an operator needs to audit one invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub checked: MergeReport,
    pub trusted_channels: usize,
    pub outputs: Vec<OutputSummary>,
}

impl RunReport {
    pub fn new(sources: Vec<SourceReport>, checked: MergeReport, trusted_channels: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            sources,
            checked,
            trusted_channels,
            outputs: Vec::new(),
        }
    }

    pub async fn write_json(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
