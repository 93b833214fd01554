//! Serializing the merged channel list

pub mod m3u_writer;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub use m3u_writer::PlaylistWriter;

/// How per-channel header overrides are encoded in the written playlist
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    /// `#EXTVLCOPT:` lines before the stream line
    #[serde(alias = "vlc")]
    #[strum(to_string = "m3u", serialize = "vlc")]
    M3u,
    /// `url|User-Agent=...&Referer=...` suffix on the stream line
    #[serde(alias = "pipe")]
    #[strum(to_string = "kodi", serialize = "pipe")]
    Kodi,
    /// Overrides are dropped
    #[strum(to_string = "plain")]
    Plain,
}
