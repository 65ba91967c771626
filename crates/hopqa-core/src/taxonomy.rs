//! Keyword taxonomy used by intent analysis and entity resolution.
//!
//! Every list can be overridden from `taxonomy.json` so a deployment can extend
//! the vocabulary for its domain without a rebuild. Lists are matched
//! case-insensitively; entries are lowercased on load.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "in", "on", "at", "to", "for", "by", "with", "from", "and", "or",
    "is", "are", "was", "were", "be", "been", "do", "does", "did", "has", "have", "had", "what",
    "who", "whom", "whose", "which", "where", "when", "why", "how", "that", "this", "these",
    "those", "it", "its", "as", "about", "into", "me", "tell", "there", "their", "they", "can",
    "could", "would", "should", "i", "you", "we", "my", "your", "between", "much", "many",
];

const ORG_INDICATORS: &[&str] = &[
    "university", "college", "school", "institute", "institution", "company", "corp",
    "corporation", "inc", "ltd", "llc", "foundation", "center", "centre", "association",
    "society", "agency", "department", "ministry", "council", "group", "bank", "laboratory",
    "labs", "organization", "organisation", "committee", "hospital", "museum", "party",
];

const DOMAIN_WORDS: &[&str] = &[
    "university", "college", "institute", "foundation", "center", "centre", "company",
    "theorem", "theory", "law", "principle", "effect", "algorithm", "model",
];

const ROLE_WORDS: &[&str] = &[
    "ceo", "founder", "co-founder", "president", "director", "chairman", "professor",
    "author", "inventor", "leader", "head", "chief", "minister", "scientist", "creator",
];

const LOCATION_WORDS: &[&str] = &[
    "city", "country", "state", "region", "located", "headquarters", "headquartered",
    "capital", "based",
];

const TEMPORAL_WORDS: &[&str] = &[
    "year", "date", "century", "decade", "founded", "established", "born", "died",
];

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Configurable keyword lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Taxonomy {
    /// Tokens ignored when matching query text against entity names.
    pub stop_words: Vec<String>,
    /// Words that mark a phrase as naming an organization.
    pub org_indicators: Vec<String>,
    /// Lowercase words allowed inside candidate phrases alongside capitalized tokens.
    pub domain_words: Vec<String>,
    /// Words whose presence suggests the answer is a person.
    pub role_words: Vec<String>,
    /// Words whose presence suggests the answer is a place.
    pub location_words: Vec<String>,
    /// Words whose presence suggests the answer is a date.
    pub temporal_words: Vec<String>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            stop_words: owned(STOP_WORDS),
            org_indicators: owned(ORG_INDICATORS),
            domain_words: owned(DOMAIN_WORDS),
            role_words: owned(ROLE_WORDS),
            location_words: owned(LOCATION_WORDS),
            temporal_words: owned(TEMPORAL_WORDS),
        }
    }
}

impl Taxonomy {
    /// Load taxonomy from file, falling back to the built-in lists.
    pub fn load(path: &Path) -> Self {
        let taxonomy = match std::fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<Taxonomy>(&s) {
                Ok(t) => {
                    info!("Loaded taxonomy from {}", path.display());
                    t
                }
                Err(e) => {
                    warn!("Ignoring unparsable {}: {}", path.display(), e);
                    Taxonomy::default()
                }
            },
            Err(_) => Taxonomy::default(),
        };
        taxonomy.lowercased()
    }

    fn lowercased(mut self) -> Self {
        for list in [
            &mut self.stop_words,
            &mut self.org_indicators,
            &mut self.domain_words,
            &mut self.role_words,
            &mut self.location_words,
            &mut self.temporal_words,
        ] {
            for w in list.iter_mut() {
                *w = w.trim().to_lowercase();
            }
            list.retain(|w| !w.is_empty());
        }
        self
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        contains_ci(&self.stop_words, word)
    }

    pub fn is_org_indicator(&self, word: &str) -> bool {
        contains_ci(&self.org_indicators, word)
    }

    pub fn is_domain_word(&self, word: &str) -> bool {
        contains_ci(&self.domain_words, word)
    }

    /// Distinct role words present among `tokens` (already lowercased).
    pub fn role_hits<'a>(&self, tokens: &'a [String]) -> HashSet<&'a str> {
        hits(&self.role_words, tokens)
    }

    pub fn location_hits<'a>(&self, tokens: &'a [String]) -> HashSet<&'a str> {
        hits(&self.location_words, tokens)
    }

    pub fn temporal_hits<'a>(&self, tokens: &'a [String]) -> HashSet<&'a str> {
        hits(&self.temporal_words, tokens)
    }

    /// Whether any word of `phrase` is an organization indicator.
    pub fn looks_like_organization(&self, phrase: &str) -> bool {
        phrase
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .any(|w| self.is_org_indicator(w))
    }
}

fn contains_ci(list: &[String], word: &str) -> bool {
    let lower = word.to_lowercase();
    list.iter().any(|w| *w == lower)
}

fn hits<'a>(list: &[String], tokens: &'a [String]) -> HashSet<&'a str> {
    tokens
        .iter()
        .filter(|t| list.iter().any(|w| w == *t))
        .map(|t| t.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lists() {
        let t = Taxonomy::default();
        assert!(t.is_stop_word("The"));
        assert!(t.is_org_indicator("University"));
        assert!(t.is_domain_word("university"));
        assert!(!t.is_stop_word("Carter"));
    }

    #[test]
    fn test_looks_like_organization() {
        let t = Taxonomy::default();
        assert!(t.looks_like_organization("Carter Center"));
        assert!(t.looks_like_organization("Stanford University,"));
        assert!(!t.looks_like_organization("Jimmy Carter"));
    }

    #[test]
    fn test_role_hits() {
        let t = Taxonomy::default();
        let tokens: Vec<String> = ["who", "is", "the", "ceo", "of", "acme"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let found = t.role_hits(&tokens);
        assert!(found.contains("ceo"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_load_override_is_lowercased() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.json");
        std::fs::write(&path, r#"{"org_indicators": ["Consortium", "  Guild "]}"#).unwrap();
        let t = Taxonomy::load(&path);
        assert!(t.is_org_indicator("consortium"));
        assert!(t.is_org_indicator("GUILD"));
        // Lists absent from the file keep their defaults
        assert!(t.is_stop_word("the"));
        assert!(!t.is_org_indicator("university"));
    }

    #[test]
    fn test_load_garbage_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.json");
        std::fs::write(&path, "not json").unwrap();
        let t = Taxonomy::load(&path);
        assert!(t.is_org_indicator("university"));
    }
}
