//! One merge run, from loaded source text to written playlists

use std::sync::Arc;
use tracing::info;

use crate::config::{Config, OutputTarget};
use crate::errors::AppResult;
use crate::ingestor::{PlaylistParser, extract_header_line};
use crate::models::{ChannelRecord, RunReport};
use crate::output::PlaylistWriter;
use crate::services::{AdmissionGate, ChannelMerger, LivenessCheck, ProbeScheduler};
use crate::sources::SourceLoad;

const BARE_HEADER: &str = "#EXTM3U";

/// Result of a run before anything is written
#[derive(Debug, Clone)]
pub struct MergeRun {
    pub header: String,
    pub channels: Vec<ChannelRecord>,
    pub report: RunReport,
}

pub struct MergePipeline {
    parser: PlaylistParser,
    merger: ChannelMerger,
    header_override: Option<String>,
}

impl MergePipeline {
    pub fn new(config: &Config, checker: Arc<dyn LivenessCheck>) -> AppResult<Self> {
        let gate = AdmissionGate::new(config.scheduler.max_concurrent_probes);
        Ok(Self {
            parser: PlaylistParser::new(&config.tables)?,
            merger: ChannelMerger::new(ProbeScheduler::new(checker, gate)),
            header_override: config.output.header.clone(),
        })
    }

    /// Parse every source, probe the untrusted ones and merge. Checked
    /// channels come first; trusted ones are appended, with a final dedup
    /// so no stream URL appears twice.
    pub async fn run(&self, load: SourceLoad) -> MergeRun {
        let header = self.header_override.clone().unwrap_or_else(|| {
            load.sources
                .iter()
                .map(|source| extract_header_line(&source.text))
                .find(|line| line != BARE_HEADER)
                .unwrap_or_else(|| BARE_HEADER.to_string())
        });

        let (trusted, checked): (Vec<_>, Vec<_>) =
            load.sources.iter().partition(|source| source.trusted);

        let checked_batches: Vec<Vec<ChannelRecord>> = checked
            .iter()
            .map(|source| self.parser.parse(&source.text))
            .collect();
        let trusted_batches: Vec<Vec<ChannelRecord>> = trusted
            .iter()
            .map(|source| self.parser.parse(&source.text))
            .collect();

        let checked = self.merger.merge_checked(checked_batches).await;
        let trusted = ChannelMerger::merge_unchecked(trusted_batches);
        let trusted_channels = trusted.len();

        let channels = ChannelMerger::merge_unchecked([checked.channels, trusted]);
        info!(
            "Merged {} channels ({} checked, {} trusted)",
            channels.len(),
            checked.report.kept,
            trusted_channels
        );

        MergeRun {
            header,
            channels,
            report: RunReport::new(load.reports, checked.report, trusted_channels),
        }
    }

    /// Write the run to every target and record what was written
    pub async fn write_outputs(run: &mut MergeRun, targets: &[OutputTarget]) -> AppResult<()> {
        for target in targets {
            let summary =
                PlaylistWriter::write_to(&target.path, &run.header, &run.channels, target.format)
                    .await?;
            run.report.outputs.push(summary);
        }
        Ok(())
    }
}
