pub mod channel;
pub mod report;

pub use channel::{ChannelRecord, StreamHeaders, split_metadata};
pub use report::{
    ChannelDiagnostic, ChannelDisposition, MergeReport, OutputSummary, RunReport, SourceReport,
    SourceStatus,
};
