//! Error type definitions for m3u-merge

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Source handling errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Filesystem errors while writing output or reports
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while loading a playlist location
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network failure talking to the source
    #[error("Request failed for {url}: {message}")]
    Request { url: String, message: String },

    /// Non-success HTTP status from the source
    #[error("HTTP error: {status} - {url}")]
    Http { status: u16, url: String },

    /// Local file could not be read
    #[error("Failed to read {path}: {message}")]
    File { path: String, message: String },

    /// Body could not be decompressed or decoded as text
    #[error("Decode error for {location}: {message}")]
    Decode { location: String, message: String },

    /// Source answered but carried no playlist content
    #[error("Source is empty: {location}")]
    Empty { location: String },

    /// Every fetch attempt failed
    #[error("Source unavailable after {attempts} attempt(s): {location} ({last_error})")]
    Unavailable {
        location: String,
        attempts: u32,
        last_error: String,
    },
}

/// Transport-level failure of a single probe attempt
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Attempt exceeded its timeout
    #[error("Probe timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Request could not be sent or the connection failed
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Body could not be read
    #[error("Body read failed: {0}")]
    Body(String),

    /// URL could not be interpreted for this probe
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl SourceError {
    /// Create a request error
    pub fn request<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Request {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode<L: Into<String>, M: Into<String>>(location: L, message: M) -> Self {
        Self::Decode {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        Self::configuration(err.to_string())
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Connect(err.to_string())
        }
    }
}
