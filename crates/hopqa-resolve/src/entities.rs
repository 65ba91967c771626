//! Maps query text to candidate entities in the store.
//!
//! Two passes, in order:
//!
//! 1. **Topical**: scan the most central entities and match their names
//!    against the query (containment, parenthesised acronym, token overlap).
//!    Suited to concept-style graphs where names are ordinary words.
//! 2. **N-gram**: only when the topical pass finds nothing. Build 3/2/1-token
//!    phrases from capitalised tokens and look each one up by exact name,
//!    then by containment.

use std::collections::HashSet;

use hopqa_core::{Result, Taxonomy};
use hopqa_store::{Entity, GraphStore, TraversalControl, TypeFilter};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::intent::IntentAnalyzer;
use crate::types::{Candidate, ExpectedType, IntentAnalysis};

const EXACT_QUALITY: f64 = 1.0;
const CONTAINS_QUALITY: f64 = 0.8;
const TOPICAL_NAME_QUALITY: f64 = 0.9;
const TOPICAL_ACRONYM_QUALITY: f64 = 0.85;
const MIN_TOPICAL_TOKEN_LEN: usize = 3;
const MAX_NGRAM: usize = 3;

static ACRONYM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([A-Za-z0-9]{2,10})\)").unwrap());

/// A phrase proposed by the n-gram pass.
#[derive(Debug, Clone, PartialEq)]
struct Phrase {
    text: String,
    start: usize,
    end: usize,
    /// Introduced by "at": names a place of work or study.
    org_hint: bool,
}

pub struct EntityResolver<'a> {
    store: &'a dyn GraphStore,
    taxonomy: &'a Taxonomy,
    max_candidates: usize,
    scan_limit: usize,
    control: Option<&'a TraversalControl>,
}

impl<'a> EntityResolver<'a> {
    pub fn new(
        store: &'a dyn GraphStore,
        taxonomy: &'a Taxonomy,
        max_candidates: usize,
        scan_limit: usize,
    ) -> Self {
        Self {
            store,
            taxonomy,
            max_candidates: max_candidates.max(1),
            scan_limit,
            control: None,
        }
    }

    /// Stop between lookups once the query is cancelled or past its deadline.
    pub fn with_control(mut self, control: &'a TraversalControl) -> Self {
        self.control = Some(control);
        self
    }

    fn checkpoint(&self) -> Result<()> {
        match self.control {
            Some(control) => control.checkpoint(),
            None => Ok(()),
        }
    }

    /// Candidates for `query`, best first, deduplicated by entity id.
    pub fn resolve(&self, query: &str, intent: &IntentAnalysis) -> Result<Vec<Candidate>> {
        let topical = self.resolve_topical(query)?;
        if !topical.is_empty() {
            debug!("Topical pass matched {} entities", topical.len());
            return Ok(self.finalize(topical));
        }
        let ngram = self.resolve_ngrams(query, intent)?;
        debug!("N-gram pass matched {} entities", ngram.len());
        Ok(self.finalize(ngram))
    }

    /// Match the query against names of the most central entities.
    pub fn resolve_topical(&self, query: &str) -> Result<Vec<Candidate>> {
        let query_lower = query.to_lowercase();
        let query_tokens = self.content_tokens(&query_lower);
        if query_tokens.is_empty() || self.scan_limit == 0 {
            return Ok(Vec::new());
        }
        self.checkpoint()?;

        let mut out = Vec::new();
        for entity in self.store.scan_entities(self.scan_limit)? {
            if let Some((matched, quality)) = self.topical_match(&entity, &query_lower, &query_tokens) {
                out.push(candidate(&entity, matched, quality));
            }
        }
        Ok(out)
    }

    fn topical_match(
        &self,
        entity: &Entity,
        query_lower: &str,
        query_tokens: &HashSet<String>,
    ) -> Option<(String, f64)> {
        let name_lower = entity.canonical_name.trim().to_lowercase();
        if name_lower.len() >= MIN_TOPICAL_TOKEN_LEN
            && !self.taxonomy.is_stop_word(&name_lower)
            && contains_phrase(query_lower, &name_lower)
        {
            return Some((entity.canonical_name.clone(), TOPICAL_NAME_QUALITY));
        }

        if let Some(acronym) = ACRONYM.captures(&entity.canonical_name).and_then(|c| c.get(1)) {
            let short = acronym.as_str().to_lowercase();
            if ordered_tokens(query_lower).iter().any(|t| *t == short) {
                return Some((acronym.as_str().to_string(), TOPICAL_ACRONYM_QUALITY));
            }
        }

        let name_tokens: Vec<String> = ordered_tokens(&name_lower)
            .into_iter()
            .filter(|t| self.is_content_token(t))
            .collect();
        if name_tokens.is_empty() {
            return None;
        }
        let shared: Vec<&String> = name_tokens.iter().filter(|t| query_tokens.contains(*t)).collect();
        if shared.is_empty() {
            return None;
        }
        let ratio = shared.len() as f64 / name_tokens.len() as f64;
        if ratio < 0.5 {
            return None;
        }
        let matched = shared.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ");
        Some((matched, 0.4 + 0.4 * ratio))
    }

    /// Phrase-driven lookup. Per-phrase store failures are logged and skipped;
    /// cancellation and timeout abort the pass.
    pub fn resolve_ngrams(&self, query: &str, intent: &IntentAnalysis) -> Result<Vec<Candidate>> {
        let tokens = phrase_tokens(query);
        let mut covered: Vec<(usize, usize)> = Vec::new();
        let mut out = Vec::new();

        for phrase in self.phrases(&tokens) {
            self.checkpoint()?;
            if covered.iter().any(|(s, e)| phrase.start >= *s && phrase.end <= *e) {
                continue;
            }
            let filter = self.phrase_filter(&phrase, intent);

            match self.lookup(|f| self.store.get_by_exact_name(&phrase.text, f), &filter) {
                Ok(found) if !found.is_empty() => {
                    covered.push((phrase.start, phrase.end));
                    out.extend(found.iter().map(|e| candidate(e, phrase.text.clone(), EXACT_QUALITY)));
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Exact lookup for {:?} failed: {}", phrase.text, e);
                    continue;
                }
            }

            let limit = self.max_candidates;
            match self.lookup(|f| self.store.get_by_substring(&phrase.text, f, limit), &filter) {
                Ok(found) => {
                    out.extend(found.iter().map(|e| candidate(e, phrase.text.clone(), CONTAINS_QUALITY)))
                }
                Err(e) => warn!("Substring lookup for {:?} failed: {}", phrase.text, e),
            }
        }
        Ok(out)
    }

    /// Run a lookup with the type filter, retrying unfiltered when it finds nothing.
    fn lookup<F>(&self, query: F, filter: &TypeFilter) -> Result<Vec<Entity>>
    where
        F: Fn(&TypeFilter) -> Result<Vec<Entity>>,
    {
        let found = query(filter)?;
        if found.is_empty() && *filter != TypeFilter::Any {
            return query(&TypeFilter::Any);
        }
        Ok(found)
    }

    fn phrase_filter(&self, phrase: &Phrase, intent: &IntentAnalysis) -> TypeFilter {
        if intent.spans_multiple() {
            return TypeFilter::Any;
        }
        if phrase.org_hint || self.taxonomy.looks_like_organization(&phrase.text) {
            return TypeFilter::tags(
                IntentAnalyzer::compatible_entity_types(ExpectedType::Organization)
                    .iter()
                    .copied(),
            );
        }
        if phrase.end - phrase.start >= 2 {
            return TypeFilter::tags(
                IntentAnalyzer::compatible_entity_types(ExpectedType::Person)
                    .iter()
                    .copied(),
            );
        }
        TypeFilter::Any
    }

    /// Longest phrases first; "at <Name>" phrases lead.
    fn phrases(&self, tokens: &[String]) -> Vec<Phrase> {
        let significant: Vec<bool> = tokens
            .iter()
            .map(|t| is_capitalized(t) && !self.taxonomy.is_stop_word(t))
            .collect();
        let usable: Vec<bool> = tokens
            .iter()
            .zip(&significant)
            .map(|(t, s)| *s || self.taxonomy.is_domain_word(t))
            .collect();

        let mut out: Vec<Phrase> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut push = |out: &mut Vec<Phrase>, start: usize, end: usize, org_hint: bool| {
            let text = tokens[start..end].join(" ");
            if seen.insert(text.to_lowercase()) {
                out.push(Phrase {
                    text,
                    start,
                    end,
                    org_hint,
                });
            }
        };

        for i in 0..tokens.len().saturating_sub(1) {
            if tokens[i].eq_ignore_ascii_case("at") && significant[i + 1] {
                let mut end = i + 1;
                while end < tokens.len() && usable[end] && end - (i + 1) < MAX_NGRAM + 1 {
                    end += 1;
                }
                push(&mut out, i + 1, end, true);
            }
        }

        for n in (1..=MAX_NGRAM).rev() {
            if n > tokens.len() {
                continue;
            }
            for start in 0..=tokens.len() - n {
                let end = start + n;
                if usable[start..end].iter().all(|u| *u) && significant[start..end].iter().any(|s| *s) {
                    push(&mut out, start, end, false);
                }
            }
        }
        out
    }

    fn finalize(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| {
            b.match_quality
                .partial_cmp(&a.match_quality)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.matched_substring.len().cmp(&a.matched_substring.len()))
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.entity_id.clone()));
        candidates.truncate(self.max_candidates);
        candidates
    }

    fn content_tokens(&self, text: &str) -> HashSet<String> {
        ordered_tokens(text)
            .into_iter()
            .filter(|t| self.is_content_token(t))
            .collect()
    }

    fn is_content_token(&self, token: &str) -> bool {
        token.chars().count() >= MIN_TOPICAL_TOKEN_LEN && !self.taxonomy.is_stop_word(token)
    }
}

fn candidate(entity: &Entity, matched: String, quality: f64) -> Candidate {
    Candidate {
        entity_id: entity.id.clone(),
        canonical_name: entity.canonical_name.clone(),
        entity_type: entity.entity_type.clone(),
        matched_substring: matched,
        match_quality: quality,
    }
}

fn ordered_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whitespace tokens with edge punctuation and possessives stripped.
fn phrase_tokens(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .map(|t| {
            t.strip_suffix("'s")
                .or_else(|| t.strip_suffix("\u{2019}s"))
                .unwrap_or(t)
        })
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_capitalized(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

/// `needle` occurs in `haystack` on word boundaries.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hopqa_store::{GraphSnapshot, Relationship, SqliteGraphStore};

    fn test_store() -> (SqliteGraphStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteGraphStore::open(dir.path(), (0.0, 1.0)).unwrap();
        (store, dir)
    }

    fn seed(store: &SqliteGraphStore, nodes: Vec<Entity>) {
        store
            .import_graph(&GraphSnapshot {
                nodes,
                edges: Vec::<Relationship>::new(),
            })
            .unwrap();
    }

    fn intent(query: &str) -> IntentAnalysis {
        IntentAnalyzer::new(Arc::new(Taxonomy::default())).analyze(query)
    }

    #[test]
    fn test_topical_name_containment() {
        let (store, _dir) = test_store();
        seed(
            &store,
            vec![
                Entity::new("center", "Carter Center", "ORGANIZATION"),
                Entity::new("carter", "Jimmy Carter", "PERSON"),
                Entity::new("atl", "Atlanta", "LOCATION"),
            ],
        );
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);
        let q = "Who founded the Carter Center?";
        let out = resolver.resolve(q, &intent(q)).unwrap();
        assert_eq!(out[0].entity_id, "center");
        assert_eq!(out[0].match_quality, TOPICAL_NAME_QUALITY);
        // "carter" overlaps half of "Jimmy Carter"
        assert_eq!(out[1].entity_id, "carter");
        assert!((out[1].match_quality - 0.6).abs() < 1e-9);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_topical_acronym() {
        let (store, _dir) = test_store();
        seed(
            &store,
            vec![Entity::new("gr", "General Relativity (GR)", "THEORY")],
        );
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);
        let out = resolver.resolve_topical("Who proposed GR?").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].matched_substring, "GR");
        assert_eq!(out[0].match_quality, TOPICAL_ACRONYM_QUALITY);
    }

    #[test]
    fn test_ngram_exact_returns_all_duplicates() {
        let (store, _dir) = test_store();
        seed(
            &store,
            vec![
                Entity::new("e1", "Mercury", "PLANET"),
                Entity::new("e2", "Mercury", "ELEMENT"),
            ],
        );
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);
        let q = "What orbits Mercury?";
        let out = resolver.resolve_ngrams(q, &intent(q)).unwrap();
        let ids: Vec<&str> = out.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
        assert!(out.iter().all(|c| c.match_quality == EXACT_QUALITY));
    }

    #[test]
    fn test_ngram_longest_match_covers_subphrases() {
        let (store, _dir) = test_store();
        seed(
            &store,
            vec![
                Entity::new("center", "Carter Center", "ORGANIZATION"),
                Entity::new("carter", "Jimmy Carter", "PERSON"),
            ],
        );
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);
        let q = "Who founded the Carter Center?";
        let out = resolver.resolve_ngrams(q, &intent(q)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_id, "center");
    }

    #[test]
    fn test_ngram_contains_match_and_at_rule() {
        let (store, _dir) = test_store();
        seed(
            &store,
            vec![Entity::new("su", "Stanford Labs", "ORGANIZATION")],
        );
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);
        let q = "who studied at Stanford";
        let out = resolver.resolve_ngrams(q, &intent(q)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].match_quality, CONTAINS_QUALITY);
        assert_eq!(out[0].matched_substring, "Stanford");
    }

    #[test]
    fn test_type_filter_falls_back_to_any() {
        let (store, _dir) = test_store();
        // Two capitalised tokens suggest a person, but the entity is a company
        seed(&store, vec![Entity::new("ab", "Acme Bolts", "COMPANY")]);
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);
        let q = "Who runs Acme Bolts";
        let out = resolver.resolve_ngrams(q, &intent(q)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_id, "ab");
    }

    #[test]
    fn test_multiple_intent_drops_type_filter() {
        let (store, _dir) = test_store();
        seed(
            &store,
            vec![
                Entity::new("mj_org", "Michael Jordan", "ORGANIZATION"),
                Entity::new("mj_person", "Michael Jordan", "PERSON"),
            ],
        );
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);

        let single = "Who is Michael Jordan";
        assert_eq!(intent(single).expected_type, ExpectedType::Person);
        let out = resolver.resolve_ngrams(single, &intent(single)).unwrap();
        let ids: Vec<&str> = out.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["mj_person"]);

        let mixed = "Who lives where Michael Jordan works";
        assert!(intent(mixed).spans_multiple());
        let out = resolver.resolve_ngrams(mixed, &intent(mixed)).unwrap();
        let ids: Vec<&str> = out.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["mj_org", "mj_person"]);
    }

    #[test]
    fn test_cancelled_control_stops_resolution() {
        let (store, _dir) = test_store();
        seed(&store, vec![Entity::new("ab", "Acme Bolts", "COMPANY")]);
        let taxonomy = Taxonomy::default();
        let control = TraversalControl::unbounded();
        control.cancel_token().cancel();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100).with_control(&control);
        let q = "Who runs Acme Bolts";
        assert!(matches!(
            resolver.resolve_ngrams(q, &intent(q)),
            Err(hopqa_core::Error::Cancelled)
        ));
        assert!(matches!(resolver.resolve(q, &intent(q)), Err(hopqa_core::Error::Cancelled)));
    }

    #[test]
    fn test_no_match_is_empty() {
        let (store, _dir) = test_store();
        seed(&store, vec![Entity::new("x", "Jimmy Carter", "PERSON")]);
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);
        let q = "Who invented Xylophonia?";
        assert!(resolver.resolve(q, &intent(q)).unwrap().is_empty());
    }

    #[test]
    fn test_candidates_capped_and_deduped() {
        let (store, _dir) = test_store();
        let nodes = (0..15)
            .map(|i| Entity::new(format!("n{:02}", i), "Nova", "STAR"))
            .collect();
        seed(&store, nodes);
        let taxonomy = Taxonomy::default();
        let resolver = EntityResolver::new(&store, &taxonomy, 10, 100);
        let q = "Where is Nova?";
        let out = resolver.resolve(q, &intent(q)).unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out[0].entity_id, "n00");
        let ids: HashSet<&str> = out.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn test_phrase_tokens_strip_punctuation() {
        assert_eq!(
            phrase_tokens("Who is Carter's wife?"),
            vec!["Who", "is", "Carter", "wife"]
        );
        assert!(contains_phrase("the carter center", "carter center"));
        assert!(!contains_phrase("the carters", "carter"));
    }
}
