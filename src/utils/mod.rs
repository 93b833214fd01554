//! Utility modules for m3u-merge
//!
//! Small helpers shared by the loader, the prober and the writer.

pub mod decompression;
pub mod url;

pub use decompression::{CompressionFormat, DecompressionService};
pub use self::url::UrlUtils;
