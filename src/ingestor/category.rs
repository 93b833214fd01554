use std::collections::{BTreeMap, HashMap};

/// Maps raw group labels onto the canonical category taxonomy.
///
/// Lookups are exact; a label that is not an alias comes back unchanged.
#[derive(Debug, Clone, Default)]
pub struct CategoryNormalizer {
    aliases: HashMap<String, String>,
}

impl CategoryNormalizer {
    pub fn new(synonyms: &BTreeMap<String, Vec<String>>) -> Self {
        let aliases = synonyms
            .iter()
            .flat_map(|(canonical, raw)| {
                raw.iter().map(move |alias| (alias.clone(), canonical.clone()))
            })
            .collect();
        Self { aliases }
    }

    pub fn normalize<'a>(&'a self, label: &'a str) -> &'a str {
        self.aliases.get(label).map(String::as_str).unwrap_or(label)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
