use regex::Regex;

use crate::errors::{AppError, AppResult};

/// Strips presentation noise (quality tags, country codes, bracketed
/// suffixes) from channel display names
#[derive(Debug, Clone)]
pub struct NameCleaner {
    patterns: Vec<Regex>,
}

impl NameCleaner {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> AppResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    AppError::configuration(format!(
                        "Invalid name cleanup pattern '{}': {e}",
                        p.as_ref()
                    ))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Apply every pattern in order and collapse the leftover whitespace.
    /// May return an empty string; callers keep the raw name in that case.
    pub fn clean(&self, name: &str) -> String {
        let mut cleaned = name.to_string();
        for re in &self.patterns {
            cleaned = re.replace_all(&cleaned, "").into_owned();
        }
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
