//! Stream liveness prober
//!
//! Runs an ordered chain of [`ProbeStrategy`] values against one stream.
//! The default chain is blocklist, push-media TCP check, HTTP check and the
//! ffprobe fallback. If every strategy is inconclusive the stream is
//! considered dead.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::http_transport::{HttpTransport, ReqwestTransport};
use super::probe_strategies::{
    BlocklistStrategy, FallbackStrategy, HttpStrategy, ProbeStrategy, ProbeTarget, ProbeVerdict,
    PushMediaStrategy,
};
use super::stream_analyzer::{FfprobeAnalyzer, StreamAnalyzer};
use crate::config::{ProbeConfig, StaticTables};
use crate::errors::AppResult;
use crate::models::{ChannelRecord, StreamHeaders};
use crate::utils::UrlUtils;

/// Result of probing one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    /// Strategy that reached the verdict; `None` when all were inconclusive
    pub decided_by: Option<&'static str>,
    pub elapsed: Duration,
}

impl ProbeOutcome {
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            decided_by: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// Anything that can tell whether a channel's stream is alive
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    async fn check(&self, record: &ChannelRecord) -> ProbeOutcome;
}

pub struct StreamProber {
    strategies: Vec<Box<dyn ProbeStrategy>>,
    max_attempts: u32,
}

impl StreamProber {
    /// Prober with an explicit strategy chain
    pub fn new(strategies: Vec<Box<dyn ProbeStrategy>>, max_attempts: u32) -> Self {
        Self {
            strategies,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Default chain over the real network
    pub fn from_config(probe: &ProbeConfig, tables: &StaticTables) -> AppResult<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(probe)?);
        let analyzer: Option<Arc<dyn StreamAnalyzer>> = probe
            .fallback
            .enabled
            .then(|| Arc::new(FfprobeAnalyzer::new(&probe.fallback)) as Arc<dyn StreamAnalyzer>);
        Ok(Self::with_transport(probe, tables, transport, analyzer))
    }

    /// Default chain over the given transport and optional fallback analyzer
    pub fn with_transport(
        probe: &ProbeConfig,
        tables: &StaticTables,
        transport: Arc<dyn HttpTransport>,
        analyzer: Option<Arc<dyn StreamAnalyzer>>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn ProbeStrategy>> = vec![
            Box::new(BlocklistStrategy::new(tables.blocked_domains.iter().cloned())),
            Box::new(PushMediaStrategy::new(probe)),
            Box::new(HttpStrategy::new(probe, transport)),
        ];
        if let Some(analyzer) = analyzer {
            strategies.push(Box::new(FallbackStrategy::new(analyzer)));
        }
        Self::new(strategies, probe.max_attempts)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain until a strategy is conclusive
    pub async fn evaluate(&self, target: &ProbeTarget) -> ProbeOutcome {
        let started = Instant::now();

        for strategy in &self.strategies {
            match strategy.evaluate(target).await {
                ProbeVerdict::Inconclusive => continue,
                verdict => {
                    let reachable = verdict == ProbeVerdict::Reachable;
                    debug!(
                        "{} -> {} by {} in {:?}",
                        UrlUtils::obfuscate_credentials(&target.url),
                        if reachable { "reachable" } else { "unreachable" },
                        strategy.name(),
                        started.elapsed()
                    );
                    return ProbeOutcome {
                        reachable,
                        decided_by: Some(strategy.name()),
                        elapsed: started.elapsed(),
                    };
                }
            }
        }

        debug!(
            "{} -> unreachable, no strategy was conclusive",
            UrlUtils::obfuscate_credentials(&target.url)
        );
        ProbeOutcome {
            reachable: false,
            decided_by: None,
            elapsed: started.elapsed(),
        }
    }

    /// Is this stream currently reachable?
    pub async fn probe(&self, url: &str, headers: &StreamHeaders, max_attempts: u32) -> bool {
        self.evaluate(&ProbeTarget::new(url, headers.clone(), max_attempts))
            .await
            .reachable
    }
}

#[async_trait]
impl LivenessCheck for StreamProber {
    async fn check(&self, record: &ChannelRecord) -> ProbeOutcome {
        self.evaluate(&ProbeTarget::for_record(record, self.max_attempts))
            .await
    }
}
