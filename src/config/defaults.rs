/// Configuration default values
///
/// Every tunable of the merge engine has its compiled-in default here so
/// the numbers live in one place.
use std::time::Duration;

// Liveness probe defaults
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 3;
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ACCEPTED_STATUSES: [u16; 4] = [200, 301, 302, 307];
pub const DEFAULT_MANIFEST_READ_LIMIT: usize = 4 * 1024;
pub const DEFAULT_MEDIA_READ_LIMIT: usize = 1024;
pub const DEFAULT_PUSH_SCHEMES: [&str; 4] = ["rtmp", "rtmpe", "rtmps", "rtmpt"];
pub const DEFAULT_PUSH_PORT: u16 = 1935;

// Fallback analyzer defaults
pub const DEFAULT_FFPROBE_COMMAND: &str = "ffprobe";
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(3);

// Scheduler defaults
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 5;

// Source fetch defaults
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
pub const DEFAULT_FETCH_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// Output defaults
pub const DEFAULT_OUTPUT_PATH: &str = "merged_channels.m3u";

// Static table defaults
pub const DEFAULT_CATEGORY: &str = "Unsorted";
pub const DEFAULT_BLOCKED_DOMAINS: [&str; 2] = ["ngenix.net", "zabava"];
pub const DEFAULT_EXCLUSIONS: [&str; 1] = ["Взрослые"];

/// Canonical category followed by the labels that collapse into it
pub const DEFAULT_CATEGORY_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "Кино и Сериалы",
        &["Кинозал", "Русский кинозал", "Кинозалы", "Кино и сериалы"],
    ),
    ("Эфирные", &["Общественные"]),
    ("Спортивные", &["Наш спорт"]),
    ("Хобби и увлечения", &["Досуг"]),
    ("Новости", &["Новостные"]),
    // Latin "o" in the source label
    ("Региональные", &["Региoнальные"]),
    ("Религиозные", &["Христианские"]),
];

/// Display-name noise: parenthesized suffixes, bracket tags, quality and
/// country markers
pub const DEFAULT_NAME_CLEANUP_PATTERNS: &[&str] = &[
    r"\s*\([^)]*\)",
    r"\s*\[[^\]]*\]",
    r"(?i)\s+(?:HD|FHD|UHD|SD|4K|HEVC|H265|720p|1080p|2160p|50\s?fps)\b",
    r"\s+(?:RU|UA|BY|KZ|UK|US)\b",
    r"(?i)\s+\b(?:orig|backup|test)\b",
];
