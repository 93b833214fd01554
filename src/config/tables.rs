//! Static lookup tables consumed by the parser and prober.
//!
//! These are data, not logic. They are loaded with the rest of the
//! configuration and handed to the core as immutable values so tests can
//! substitute minimal fixtures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StaticTables {
    /// Category assigned when a metadata line carries no label and no group marker is active
    pub default_category: String,
    /// URL substrings that are never probed and always treated as dead
    pub blocked_domains: Vec<String>,
    /// Substrings that drop an entry when found in its category label or metadata line
    pub exclusions: Vec<String>,
    /// Canonical category name -> raw labels that collapse into it
    pub category_synonyms: BTreeMap<String, Vec<String>>,
    /// Regex patterns stripped from display names
    pub name_cleanup_patterns: Vec<String>,
}

impl StaticTables {
    /// Tables with nothing in them; every lookup passes through
    pub fn empty() -> Self {
        Self {
            default_category: DEFAULT_CATEGORY.to_string(),
            blocked_domains: Vec::new(),
            exclusions: Vec::new(),
            category_synonyms: BTreeMap::new(),
            name_cleanup_patterns: Vec::new(),
        }
    }

    pub fn with_blocked_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions = exclusions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_synonyms<S: Into<String>>(mut self, canonical: S, aliases: &[&str]) -> Self {
        self.category_synonyms.insert(
            canonical.into(),
            aliases.iter().map(|a| a.to_string()).collect(),
        );
        self
    }

    pub fn with_cleanup_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_cleanup_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for StaticTables {
    fn default() -> Self {
        let category_synonyms = DEFAULT_CATEGORY_SYNONYMS
            .iter()
            .map(|(canonical, aliases)| {
                (
                    canonical.to_string(),
                    aliases.iter().map(|a| a.to_string()).collect(),
                )
            })
            .collect();

        Self {
            default_category: DEFAULT_CATEGORY.to_string(),
            blocked_domains: DEFAULT_BLOCKED_DOMAINS.iter().map(|s| s.to_string()).collect(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            category_synonyms,
            name_cleanup_patterns: DEFAULT_NAME_CLEANUP_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}
