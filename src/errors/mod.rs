//! Centralized error handling for m3u-merge
//!
//! Errors are grouped by the layer that raises them:
//!
//! - **Source Errors**: fetching or decoding a playlist location
//! - **Probe Errors**: a single liveness attempt failing at transport level
//! - **Configuration Errors**: invalid or unloadable configuration
//!
//! Probe errors never escape the prober; they degrade a channel to
//! "not working". Source errors are reported per location and the caller
//! decides whether they abort the run.
//!
//! # Usage
//!
//! ```rust
//! use m3u_merge::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Convenience type alias for a single probe attempt
pub type ProbeResult<T> = Result<T, ProbeError>;
