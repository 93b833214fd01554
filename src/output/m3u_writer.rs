//! Playlist writer
//!
//! Channels are written sorted by cleaned display name, case-insensitively.
//! Each block is the metadata line, then format-specific directives, then
//! the stream line.

use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use super::OutputFormat;
use crate::errors::AppResult;
use crate::models::{ChannelRecord, OutputSummary};

pub struct PlaylistWriter;

impl PlaylistWriter {
    /// Stable case-insensitive sort by display name
    pub fn sorted(channels: &[ChannelRecord]) -> Vec<&ChannelRecord> {
        let mut sorted: Vec<&ChannelRecord> = channels.iter().collect();
        sorted.sort_by_cached_key(|channel| channel.sort_key());
        sorted
    }

    pub fn render(header: &str, channels: &[ChannelRecord], format: OutputFormat) -> String {
        let mut out = String::with_capacity(64 + channels.len() * 160);
        out.push_str(header.trim_end());
        out.push('\n');

        for channel in Self::sorted(channels) {
            out.push_str(&channel.metadata_line);
            out.push('\n');

            match format {
                OutputFormat::M3u => {
                    let headers = &channel.headers;
                    if let Some(user_agent) = &headers.user_agent {
                        let _ = writeln!(out, "#EXTVLCOPT:http-user-agent={user_agent}");
                    }
                    if let Some(referrer) = &headers.referrer {
                        let _ = writeln!(out, "#EXTVLCOPT:http-referrer={referrer}");
                    }
                    if let Some(origin) = &headers.origin {
                        let _ = writeln!(out, "#EXTVLCOPT:http-origin={origin}");
                    }
                    out.push_str(&channel.stream_url);
                }
                OutputFormat::Kodi => {
                    out.push_str(&channel.stream_url);
                    if !channel.headers.is_empty() {
                        let suffix = channel
                            .headers
                            .pairs()
                            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
                            .collect::<Vec<_>>()
                            .join("&");
                        out.push('|');
                        out.push_str(&suffix);
                    }
                }
                OutputFormat::Plain => out.push_str(&channel.stream_url),
            }
            out.push('\n');
        }

        out
    }

    pub async fn write_to(
        path: &Path,
        header: &str,
        channels: &[ChannelRecord],
        format: OutputFormat,
    ) -> AppResult<OutputSummary> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, Self::render(header, channels, format)).await?;
        info!(
            "Wrote {} channels to {} ({})",
            channels.len(),
            path.display(),
            format
        );

        Ok(OutputSummary {
            path: path.to_path_buf(),
            format,
            channels: channels.len(),
        })
    }
}
