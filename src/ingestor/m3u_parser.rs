//! Extended M3U playlist parser
//!
//! Every line is first classified into a [`LineKind`], then driven through a
//! two-state machine whose transitions live in [`TRANSITIONS`]. The state
//! machine never fails: lines it cannot use are skipped and counted.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::{CategoryNormalizer, NameCleaner};
use crate::config::StaticTables;
use crate::errors::AppResult;
use crate::models::{ChannelRecord, StreamHeaders, split_metadata};

static TVG_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"tvg-id=(?:"([^"]*)"|([^\s,]+))"#).expect("tvg-id pattern is valid")
});

static GROUP_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"group-title=(?:"([^"]*)"|([^\s,]+))"#).expect("group-title pattern is valid")
});

const METADATA_MARKER: &str = "#EXTINF";
const GROUP_MARKER: &str = "#EXTGRP:";
const VLC_OPTION: &str = "#EXTVLCOPT:";
const HTTP_OPTION: &str = "#EXTHTTP:";
const PLAYLIST_HEADER: &str = "#EXTM3U";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// No metadata line pending
    Idle,
    /// A metadata line was accepted and waits for its stream line
    InRecord,
    /// A metadata line was rejected; its directives and stream line are discarded
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    /// Blank lines, the playlist header, unknown comments and options
    Ignorable,
    GroupMarker,
    Directive,
    Metadata,
    /// Metadata line that is excluded or malformed
    RejectedMetadata,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Skip,
    SetGroup,
    Capture,
    Open,
    Cancel,
    Finalize,
    DropOrphan,
    Discard,
}

use Action::*;
use LineKind::*;
use ParserState::*;

const TRANSITIONS: &[(ParserState, LineKind, Action, ParserState)] = &[
    (Idle, Ignorable, Skip, Idle),
    (InRecord, Ignorable, Skip, InRecord),
    (Cancelled, Ignorable, Skip, Cancelled),
    (Idle, GroupMarker, SetGroup, Idle),
    (InRecord, GroupMarker, SetGroup, InRecord),
    (Cancelled, GroupMarker, SetGroup, Cancelled),
    (Idle, Directive, Capture, Idle),
    (InRecord, Directive, Capture, InRecord),
    (Cancelled, Directive, Skip, Cancelled),
    (Idle, Metadata, Open, InRecord),
    // a dangling metadata line is replaced by the new one
    (InRecord, Metadata, Open, InRecord),
    (Cancelled, Metadata, Open, InRecord),
    (Idle, RejectedMetadata, Cancel, Cancelled),
    (InRecord, RejectedMetadata, Cancel, Cancelled),
    (Cancelled, RejectedMetadata, Cancel, Cancelled),
    (Idle, Stream, DropOrphan, Idle),
    (InRecord, Stream, Finalize, Idle),
    (Cancelled, Stream, Discard, Idle),
];

fn transition(state: ParserState, kind: LineKind) -> (Action, ParserState) {
    TRANSITIONS
        .iter()
        .find(|(from, on, _, _)| *from == state && *on == kind)
        .map(|(_, _, action, to)| (*action, *to))
        .unwrap_or((Skip, state))
}

/// Accepted metadata line, already rewritten with its canonical category
#[derive(Debug)]
struct PendingEntry {
    metadata_line: String,
    tvg_id: Option<String>,
    category: String,
    display_name: String,
}

#[derive(Debug)]
enum Rejection {
    Excluded(String),
    Malformed,
}

#[derive(Debug)]
enum Line<'a> {
    Ignorable,
    Group(&'a str),
    Directive(StreamHeaders),
    Metadata(PendingEntry),
    Rejected(Rejection),
    Stream(&'a str),
}

impl Line<'_> {
    fn kind(&self) -> LineKind {
        match self {
            Line::Ignorable => Ignorable,
            Line::Group(_) => GroupMarker,
            Line::Directive(_) => Directive,
            Line::Metadata(_) => Metadata,
            Line::Rejected(_) => RejectedMetadata,
            Line::Stream(_) => Stream,
        }
    }
}

#[derive(Debug, Default)]
struct ParseStats {
    excluded: usize,
    malformed: usize,
    orphans: usize,
    dangling: usize,
}

/// Playlist parser configured with the exclusion, category and cleanup tables
#[derive(Debug, Clone)]
pub struct PlaylistParser {
    normalizer: CategoryNormalizer,
    cleaner: NameCleaner,
    exclusions: Vec<String>,
    default_category: String,
}

impl PlaylistParser {
    pub fn new(tables: &StaticTables) -> AppResult<Self> {
        Ok(Self {
            normalizer: CategoryNormalizer::new(&tables.category_synonyms),
            cleaner: NameCleaner::new(tables.name_cleanup_patterns.as_slice())?,
            exclusions: tables
                .exclusions
                .iter()
                .filter(|e| !e.is_empty())
                .cloned()
                .collect(),
            default_category: tables.default_category.clone(),
        })
    }

    pub fn parse(&self, text: &str) -> Vec<ChannelRecord> {
        let mut run = ParseRun::new(self);
        for (idx, line) in text.lines().enumerate() {
            run.feed(idx + 1, line);
        }
        run.finish()
    }

    fn classify<'a>(&self, line: &'a str, current_group: Option<&str>) -> Line<'a> {
        let line = line.trim_start_matches('\u{feff}').trim();

        if line.is_empty() {
            Line::Ignorable
        } else if line.starts_with(METADATA_MARKER) {
            self.inspect_metadata(line, current_group)
        } else if let Some(group) = line.strip_prefix(GROUP_MARKER) {
            Line::Group(group.trim())
        } else if line.starts_with('#') {
            parse_directive(line)
                .map(Line::Directive)
                .unwrap_or(Line::Ignorable)
        } else {
            Line::Stream(line)
        }
    }

    fn inspect_metadata(&self, line: &str, current_group: Option<&str>) -> Line<'static> {
        let Some((attributes, raw_name)) = split_metadata(line) else {
            return Line::Rejected(Rejection::Malformed);
        };

        let explicit = GROUP_TITLE.captures(attributes).map(|caps| {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
            let label = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            (whole, label)
        });

        let raw_label = explicit
            .as_ref()
            .map(|(_, label)| *label)
            .filter(|label| !label.is_empty())
            .or(current_group.filter(|group| !group.is_empty()));

        if let Some(hit) = self.exclusions.iter().find(|exclusion| {
            line.contains(exclusion.as_str())
                || raw_label.is_some_and(|label| label.contains(exclusion.as_str()))
        }) {
            return Line::Rejected(Rejection::Excluded(hit.clone()));
        }

        let category = raw_label
            .map(|label| self.normalizer.normalize(label).to_string())
            .unwrap_or_else(|| self.default_category.clone());

        let canonical_attr = format!("group-title=\"{category}\"");
        let attributes = match explicit {
            Some((range, _)) => {
                let mut rewritten = attributes.to_string();
                rewritten.replace_range(range, &canonical_attr);
                rewritten
            }
            None => format!("{} {canonical_attr}", attributes.trim_end()),
        };

        let raw_name = raw_name.trim();
        let cleaned = self.cleaner.clean(raw_name);
        let display_name = if cleaned.is_empty() {
            raw_name.to_string()
        } else {
            cleaned
        };

        let tvg_id = TVG_ID
            .captures(&attributes)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().to_string())
            .filter(|id| !id.is_empty());

        Line::Metadata(PendingEntry {
            metadata_line: format!("{attributes},{display_name}"),
            tvg_id,
            category,
            display_name,
        })
    }
}

/// Header override carried by a `#EXTVLCOPT:` or `#EXTHTTP:` line
fn parse_directive(line: &str) -> Option<StreamHeaders> {
    let mut headers = StreamHeaders::default();

    if let Some(option) = line.strip_prefix(VLC_OPTION) {
        let (key, value) = option.split_once('=')?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let value = Some(value.to_string());
        match key.trim().to_ascii_lowercase().as_str() {
            "http-user-agent" => headers.user_agent = value,
            "http-referrer" | "http-referer" => headers.referrer = value,
            "http-origin" => headers.origin = value,
            _ => return None,
        }
    } else if let Some(json) = line.strip_prefix(HTTP_OPTION) {
        let fields: HashMap<String, serde_json::Value> = match serde_json::from_str(json.trim()) {
            Ok(fields) => fields,
            Err(e) => {
                debug!("Ignoring unparsable {} line: {}", HTTP_OPTION, e);
                return None;
            }
        };
        for (key, value) in fields {
            let Some(value) = value.as_str().map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            let value = Some(value.to_string());
            match key.to_ascii_lowercase().as_str() {
                "user-agent" => headers.user_agent = value,
                "referer" | "referrer" => headers.referrer = value,
                "origin" => headers.origin = value,
                _ => {}
            }
        }
    }

    (!headers.is_empty()).then_some(headers)
}

fn merge_headers(into: &mut StreamHeaders, from: StreamHeaders) {
    if from.user_agent.is_some() {
        into.user_agent = from.user_agent;
    }
    if from.referrer.is_some() {
        into.referrer = from.referrer;
    }
    if from.origin.is_some() {
        into.origin = from.origin;
    }
}

/// Mutable state of one pass over a playlist
struct ParseRun<'p> {
    parser: &'p PlaylistParser,
    state: ParserState,
    current_group: Option<String>,
    pending: Option<PendingEntry>,
    directives: StreamHeaders,
    records: Vec<ChannelRecord>,
    stats: ParseStats,
}

impl<'p> ParseRun<'p> {
    fn new(parser: &'p PlaylistParser) -> Self {
        Self {
            parser,
            state: Idle,
            current_group: None,
            pending: None,
            directives: StreamHeaders::default(),
            records: Vec::new(),
            stats: ParseStats::default(),
        }
    }

    fn feed(&mut self, line_no: usize, raw: &str) {
        let line = self.parser.classify(raw, self.current_group.as_deref());
        let (action, next) = transition(self.state, line.kind());

        match (action, line) {
            (SetGroup, Line::Group(group)) => {
                self.current_group = (!group.is_empty()).then(|| group.to_string());
            }
            (Capture, Line::Directive(headers)) => merge_headers(&mut self.directives, headers),
            (Open, Line::Metadata(entry)) => {
                if self.pending.replace(entry).is_some() {
                    self.stats.dangling += 1;
                    debug!("Line {}: previous metadata line had no stream line", line_no);
                }
            }
            (Cancel, Line::Rejected(reason)) => {
                self.pending = None;
                self.directives = StreamHeaders::default();
                match reason {
                    Rejection::Excluded(hit) => {
                        self.stats.excluded += 1;
                        debug!("Line {}: entry excluded by '{}'", line_no, hit);
                    }
                    Rejection::Malformed => {
                        self.stats.malformed += 1;
                        warn!("Skipping malformed metadata line {}: {}", line_no, raw.trim());
                    }
                }
            }
            (Finalize, Line::Stream(url)) => {
                if let Some(entry) = self.pending.take() {
                    self.records.push(ChannelRecord {
                        metadata_line: entry.metadata_line,
                        stream_url: url.to_string(),
                        tvg_id: entry.tvg_id,
                        category: entry.category,
                        display_name: entry.display_name,
                        headers: std::mem::take(&mut self.directives),
                    });
                }
            }
            (DropOrphan, Line::Stream(_)) => {
                self.stats.orphans += 1;
                self.directives = StreamHeaders::default();
            }
            (Discard, Line::Stream(_)) => self.directives = StreamHeaders::default(),
            _ => {}
        }

        self.state = next;
    }

    fn finish(mut self) -> Vec<ChannelRecord> {
        if self.pending.take().is_some() {
            self.stats.dangling += 1;
        }
        debug!(
            "Parsed {} channels ({} excluded, {} malformed, {} orphan stream lines, {} dangling entries)",
            self.records.len(),
            self.stats.excluded,
            self.stats.malformed,
            self.stats.orphans,
            self.stats.dangling
        );
        self.records
    }
}

/// Header line for the merged playlist: the first `#EXTM3U` line that points
/// at a program guide, or a bare `#EXTM3U`
pub fn extract_header_line(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_start_matches('\u{feff}').trim())
        .find(|line| {
            line.starts_with(PLAYLIST_HEADER)
                && (line.contains("url-tvg=") || line.contains("x-tvg-url="))
        })
        .map(str::to_string)
        .unwrap_or_else(|| PLAYLIST_HEADER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn parser() -> PlaylistParser {
        PlaylistParser::new(&StaticTables::default()).unwrap()
    }

    #[test]
    fn test_transition_table_is_total() {
        let kinds = [Ignorable, GroupMarker, Directive, Metadata, RejectedMetadata, Stream];
        for state in [Idle, InRecord, Cancelled] {
            for kind in kinds {
                assert!(
                    TRANSITIONS.iter().any(|(s, k, _, _)| *s == state && *k == kind),
                    "missing transition for {state:?} on {kind:?}"
                );
            }
        }
    }

    #[test]
    fn test_basic_entries() {
        let text = "#EXTM3U url-tvg=\"http://epg.example/guide.xml\"\n\
                    #EXTINF:-1 tvg-id=\"one.ru\" group-title=\"Кинозал\",Кино Один HD\n\
                    http://a.example/1.m3u8\n\
                    \n\
                    #EXTINF:-1 tvg-id=two,Two\n\
                    http://a.example/2.ts\n";

        let records = parser().parse(text);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].stream_url, "http://a.example/1.m3u8");
        assert_eq!(records[0].tvg_id.as_deref(), Some("one.ru"));
        assert_eq!(records[0].category, "Кино и Сериалы");
        assert_eq!(records[0].display_name, "Кино Один");
        assert_eq!(
            records[0].metadata_line,
            "#EXTINF:-1 tvg-id=\"one.ru\" group-title=\"Кино и Сериалы\",Кино Один"
        );

        // unquoted id, no label: default category synthesized into the line
        assert_eq!(records[1].tvg_id.as_deref(), Some("two"));
        assert_eq!(records[1].category, "Unsorted");
        assert_eq!(
            records[1].metadata_line,
            "#EXTINF:-1 tvg-id=two group-title=\"Unsorted\",Two"
        );
    }

    #[test]
    fn test_exclusion_does_not_leak_stream_line() {
        let text = "#EXTINF:-1 group-title=\"News\",A\n\
                    http://a.example/a\n\
                    #EXTINF:-1 group-title=\"Взрослые\",Hidden\n\
                    http://a.example/hidden\n\
                    #EXTINF:-1 group-title=\"News\",B\n\
                    http://a.example/b\n";

        let records = parser().parse(text);
        let urls: Vec<_> = records.iter().map(|r| r.stream_url.as_str()).collect();
        assert_eq!(urls, vec!["http://a.example/a", "http://a.example/b"]);
    }

    #[test]
    fn test_exclusion_cancels_dangling_record() {
        // A has no stream line; the excluded entry must not hand its URL to A
        let text = "#EXTINF:-1,A\n\
                    #EXTINF:-1 group-title=\"Взрослые\",Hidden\n\
                    http://a.example/hidden\n";
        assert!(parser().parse(text).is_empty());
    }

    #[test]
    fn test_exclusion_matches_group_marker_label() {
        let text = "#EXTGRP:Взрослые\n\
                    #EXTINF:-1,Hidden\n\
                    http://a.example/hidden\n";
        assert!(parser().parse(text).is_empty());
    }

    #[test]
    fn test_group_marker_is_sticky_and_normalized() {
        let text = "#EXTGRP:Новостные\n\
                    #EXTINF:-1,One\n\
                    http://a.example/1\n\
                    #EXTINF:-1,Two\n\
                    http://a.example/2\n\
                    #EXTINF:-1 group-title=\"Музыка\",Three\n\
                    http://a.example/3\n";

        let records = parser().parse(text);
        let categories: Vec<_> = records.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["Новости", "Новости", "Музыка"]);
        assert!(records[0].metadata_line.contains("group-title=\"Новости\""));
    }

    #[test]
    fn test_directives_attach_and_reset() {
        let text = "#EXTINF:-1,One\n\
                    #EXTVLCOPT:http-user-agent=Mozilla/5.0 (SmartTV)\n\
                    #EXTVLCOPT:http-referer=https://site.example/\n\
                    http://a.example/1\n\
                    #EXTINF:-1,Two\n\
                    #EXTHTTP:{\"Origin\":\"https://origin.example\",\"User-Agent\":\"Kodi\"}\n\
                    http://a.example/2\n\
                    #EXTINF:-1,Three\n\
                    http://a.example/3\n";

        let records = parser().parse(text);
        assert_eq!(
            records[0].headers.user_agent.as_deref(),
            Some("Mozilla/5.0 (SmartTV)")
        );
        assert_eq!(records[0].headers.referrer.as_deref(), Some("https://site.example/"));
        assert_eq!(records[1].headers.user_agent.as_deref(), Some("Kodi"));
        assert_eq!(records[1].headers.origin.as_deref(), Some("https://origin.example"));
        assert!(records[1].headers.referrer.is_none());
        assert!(records[2].headers.is_empty());
    }

    #[test]
    fn test_directive_before_metadata_attaches_to_next_record() {
        let text = "#EXTVLCOPT:http-origin=https://o.example\n\
                    #EXTINF:-1,One\n\
                    http://a.example/1\n";
        let records = parser().parse(text);
        assert_eq!(records[0].headers.origin.as_deref(), Some("https://o.example"));
    }

    #[test]
    fn test_excluded_entry_resets_directives() {
        let text = "#EXTVLCOPT:http-user-agent=Secret\n\
                    #EXTINF:-1 group-title=\"Взрослые\",Hidden\n\
                    http://a.example/hidden\n\
                    #EXTINF:-1,Open\n\
                    http://a.example/open\n";
        let records = parser().parse(text);
        assert_eq!(records.len(), 1);
        assert!(records[0].headers.is_empty());
    }

    #[test]
    fn test_directive_after_excluded_metadata_is_discarded() {
        let text = "#EXTINF:-1 group-title=\"Взрослые\",Hidden\n\
                    #EXTVLCOPT:http-user-agent=Secret\n\
                    #EXTHTTP:{\"Referer\":\"https://hidden.example/\"}\n\
                    http://a.example/hidden\n\
                    #EXTINF:-1,Open\n\
                    http://a.example/open\n";
        let records = parser().parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stream_url, "http://a.example/open");
        assert!(records[0].headers.is_empty());
    }

    #[test]
    fn test_directive_before_orphan_stream_does_not_leak() {
        let text = "#EXTVLCOPT:http-user-agent=Stray\n\
                    http://orphan.example/0\n\
                    #EXTINF:-1,Next\n\
                    http://a.example/next\n";
        let records = parser().parse(text);
        assert_eq!(records.len(), 1);
        assert!(records[0].headers.is_empty());
    }

    #[test]
    fn test_malformed_and_orphan_lines_are_skipped() {
        let text = "http://orphan.example/0\n\
                    #EXTINF:-1 no comma here\n\
                    http://a.example/lost\n\
                    #EXTINF:-1,Good\n\
                    #SOMETHING-ELSE\n\
                    http://a.example/good\n\
                    #EXTINF:-1,Dangling\n";

        let records = parser().parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stream_url, "http://a.example/good");
        assert_eq!(records[0].display_name, "Good");
    }

    #[test]
    #[traced_test]
    fn test_malformed_line_is_logged() {
        let records = parser().parse("#EXTINF:-1 broken\nhttp://a.example/1\n");
        assert!(records.is_empty());
        assert!(logs_contain("Skipping malformed metadata line 1"));
    }

    #[test]
    fn test_name_cleaned_to_nothing_keeps_raw_name() {
        let records = parser().parse("#EXTINF:-1,(backup)\nhttp://a.example/1\n");
        assert_eq!(records[0].display_name, "(backup)");
        assert!(records[0].metadata_line.ends_with(",(backup)"));
    }

    #[test]
    fn test_injected_minimal_tables() {
        let tables = StaticTables::empty()
            .with_exclusions(["XXX"])
            .with_synonyms("Sports", &["Sport"]);
        let parser = PlaylistParser::new(&tables).unwrap();
        let text = "#EXTINF:-1 group-title=\"Sport\",Match HD\n\
                    http://a.example/1\n\
                    #EXTINF:-1,XXX late night\n\
                    http://a.example/2\n";

        let records = parser.parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "Sports");
        // no cleanup patterns configured
        assert_eq!(records[0].display_name, "Match HD");
    }

    #[test]
    fn test_injected_cleanup_patterns() {
        let tables = StaticTables::empty().with_cleanup_patterns([r"^\d+\.\s*", r"\s*\+\d+$"]);
        let parser = PlaylistParser::new(&tables).unwrap();
        let records = parser.parse("#EXTINF:-1,12. Match HD +2\nhttp://a.example/1\n");
        assert_eq!(records[0].display_name, "Match HD");
        assert!(records[0].metadata_line.ends_with(",Match HD"));
    }

    #[test]
    fn test_extract_header_line() {
        let text = "\u{feff}#EXTM3U x-tvg-url=\"http://epg.example/a.xml.gz\"\n#EXTINF:-1,A\nhttp://a\n";
        assert_eq!(
            extract_header_line(text),
            "#EXTM3U x-tvg-url=\"http://epg.example/a.xml.gz\""
        );
        assert_eq!(extract_header_line("#EXTM3U\n#EXTINF:-1,A\nhttp://a\n"), "#EXTM3U");
        assert_eq!(extract_header_line(""), "#EXTM3U");
    }

    proptest! {
        #[test]
        fn prop_parsing_is_deterministic(
            lines in proptest::collection::vec(
                prop_oneof![
                    Just("#EXTM3U".to_string()),
                    Just(String::new()),
                    "#EXTINF:-1 group-title=\"[A-Za-zА-я ]{0,8}\",[A-Za-z ]{0,12}",
                    "#EXTINF:-1 tvg-id=[a-z]{1,5}[ ,][A-Za-z]{0,6}",
                    "#EXTGRP:[A-Za-z]{0,6}",
                    "#EXTVLCOPT:http-user-agent=[A-Za-z/.]{0,10}",
                    "http://[a-z]{1,6}\\.example/[a-z0-9]{0,6}",
                    "#[A-Z]{0,6}",
                ],
                0..40,
            )
        ) {
            let text = lines.join("\n");
            let parser = parser();
            let first = parser.parse(&text);
            let second = parser.parse(&text);
            prop_assert_eq!(&first, &second);
            for record in &first {
                prop_assert!(!record.category.is_empty());
                prop_assert!(!record.stream_url.is_empty());
            }
        }
    }
}
