//! Deduplicating merge of channel batches
//!
//! The stream URL is the identity of a channel. The first record to claim a
//! URL wins; later ones are dropped even when they are alive.

use std::collections::HashSet;
use tracing::{debug, info};

use super::scheduler::ProbeScheduler;
use crate::models::{ChannelDiagnostic, ChannelDisposition, ChannelRecord, MergeReport};
use crate::utils::UrlUtils;

/// Channels kept by a checked merge plus the per-channel diagnostics
#[derive(Debug, Clone)]
pub struct CheckedMerge {
    pub channels: Vec<ChannelRecord>,
    pub report: MergeReport,
}

pub struct ChannelMerger {
    scheduler: ProbeScheduler,
}

impl ChannelMerger {
    pub fn new(scheduler: ProbeScheduler) -> Self {
        Self { scheduler }
    }

    /// Probe every record of every batch, then keep the reachable ones in
    /// batch order with first-seen-wins dedup
    pub async fn merge_checked<I>(&self, batches: I) -> CheckedMerge
    where
        I: IntoIterator<Item = Vec<ChannelRecord>>,
    {
        let candidates: Vec<ChannelRecord> = batches.into_iter().flatten().collect();
        let outcomes = self.scheduler.run(&candidates).await;

        let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
        let mut channels = Vec::new();
        let mut report = MergeReport::default();

        for (record, outcome) in candidates.into_iter().zip(outcomes) {
            let disposition = if !outcome.reachable {
                ChannelDisposition::Unreachable
            } else if seen.contains(&record.stream_url) {
                ChannelDisposition::Duplicate
            } else {
                ChannelDisposition::Kept
            };

            if disposition == ChannelDisposition::Unreachable {
                debug!(
                    "Channel {} - no working stream found",
                    record.tvg_id.as_deref().unwrap_or(&record.display_name)
                );
            }

            report.push(ChannelDiagnostic {
                url: UrlUtils::obfuscate_credentials(&record.stream_url),
                name: record.display_name.clone(),
                tvg_id: record.tvg_id.clone(),
                reachable: outcome.reachable,
                decided_by: outcome.decided_by.map(str::to_string),
                elapsed_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
                disposition,
            });

            if disposition == ChannelDisposition::Kept {
                seen.insert(record.stream_url.clone());
                channels.push(record);
            }
        }

        info!(
            "Checked merge: {} kept, {} unreachable, {} duplicates out of {}",
            report.kept, report.unreachable, report.duplicates, report.total
        );
        CheckedMerge { channels, report }
    }

    /// Dedup only; for batches that are trusted without probing
    pub fn merge_unchecked<I>(batches: I) -> Vec<ChannelRecord>
    where
        I: IntoIterator<Item = Vec<ChannelRecord>>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut duplicates = 0usize;
        let channels: Vec<ChannelRecord> = batches
            .into_iter()
            .flatten()
            .filter(|record| {
                let fresh = seen.insert(record.stream_url.clone());
                if !fresh {
                    duplicates += 1;
                }
                fresh
            })
            .collect();

        debug!("Unchecked merge: {} kept, {} duplicates", channels.len(), duplicates);
        channels
    }
}
