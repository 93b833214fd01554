//! The validation and merge engine
//!
//! - [`stream_prober`]: decides whether one stream is alive
//! - [`scheduler`]: runs the prober over a batch under a concurrency cap
//! - [`merger`]: turns probe results into one deduplicated channel list

pub mod http_transport;
pub mod merger;
pub mod probe_strategies;
pub mod scheduler;
pub mod stream_analyzer;
pub mod stream_prober;

pub use http_transport::{HttpTransport, ProbeResponse, ReqwestTransport};
pub use merger::{ChannelMerger, CheckedMerge};
pub use probe_strategies::{ProbeStrategy, ProbeTarget, ProbeVerdict};
pub use scheduler::{AdmissionGate, ProbeScheduler};
pub use stream_analyzer::{AnalysisReport, FfprobeAnalyzer, StreamAnalyzer};
pub use stream_prober::{LivenessCheck, ProbeOutcome, StreamProber};
