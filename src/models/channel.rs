use serde::{Deserialize, Serialize};

/// Per-channel request header overrides taken from directive lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHeaders {
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub origin: Option<String>,
}

impl StreamHeaders {
    pub fn is_empty(&self) -> bool {
        self.user_agent.is_none() && self.referrer.is_none() && self.origin.is_none()
    }

    /// Set overrides as HTTP header name/value pairs, in a stable order
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("User-Agent", self.user_agent.as_deref()),
            ("Referer", self.referrer.as_deref()),
            ("Origin", self.origin.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

/// One playlist entry: metadata line plus the stream it points at.
///
/// `stream_url` is the identity of a channel for deduplication. The
/// `category` is already canonical when a record leaves the parser, and the
/// `metadata_line` carries that canonical label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub metadata_line: String,
    pub stream_url: String,
    pub tvg_id: Option<String>,
    pub category: String,
    /// Cleaned display name, used for sorting output
    pub display_name: String,
    pub headers: StreamHeaders,
}

impl ChannelRecord {
    pub fn new<M: Into<String>, U: Into<String>>(metadata_line: M, stream_url: U) -> Self {
        let metadata_line = metadata_line.into();
        let display_name = split_metadata(&metadata_line)
            .map(|(_, name)| name.trim().to_string())
            .unwrap_or_default();
        Self {
            metadata_line,
            stream_url: stream_url.into(),
            tvg_id: None,
            category: crate::config::defaults::DEFAULT_CATEGORY.to_string(),
            display_name,
            headers: StreamHeaders::default(),
        }
    }

    pub fn with_headers(mut self, headers: StreamHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Sort key for output: display name, case-insensitive
    pub fn sort_key(&self) -> String {
        self.display_name.to_lowercase()
    }
}

/// Split a metadata line into its attribute part and display name at the
/// first comma outside double quotes. With an unbalanced quote the first
/// comma is used.
pub fn split_metadata(line: &str) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some((&line[..idx], &line[idx + 1..])),
            _ => {}
        }
    }
    if in_quotes {
        return line.split_once(',');
    }
    None
}
