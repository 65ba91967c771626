//! Rule-based classification of the answer type a question expects.
//!
//! Each category accumulates the weights of the surface patterns it matches,
//! plus flat boosts from taxonomy words. The winner must be unambiguous;
//! close runners-up turn the result into `MULTIPLE`.

use std::collections::BTreeMap;
use std::sync::Arc;

use hopqa_core::Taxonomy;
use hopqa_store::Entity;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::types::{ExpectedType, IntentAnalysis, IntentDiagnostics};

/// Runner-up categories within this fraction of the top score count as plausible.
const MULTIPLE_RATIO: f64 = 0.8;
/// ... provided they also clear this absolute score.
const MULTIPLE_FLOOR: f64 = 0.5;
const ROLE_BOOST: f64 = 0.3;
const LOCATION_BOOST: f64 = 0.3;
const TEMPORAL_BOOST: f64 = 0.3;

struct IntentRule {
    category: ExpectedType,
    name: &'static str,
    pattern: Regex,
    weight: f64,
}

fn rule(category: ExpectedType, name: &'static str, pattern: &str, weight: f64) -> IntentRule {
    IntentRule {
        category,
        name,
        pattern: Regex::new(pattern).unwrap(),
        weight,
    }
}

static RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    use ExpectedType::*;
    vec![
        rule(Person, "who", r"\bwho(m)?\b", 0.9),
        rule(Person, "whose", r"\bwhose\b", 0.7),
        rule(Person, "which_person", r"\b(which|what) (person|individual|people)\b", 0.9),
        rule(
            Person,
            "agent_verb",
            r"\b(founded|invented|created|wrote|discovered|directed|led|leads|runs|married)\b",
            0.4,
        ),
        rule(Person, "person_noun", r"\b(person|people|scientist|author|researcher)\b", 0.6),
        rule(
            Organization,
            "which_org",
            r"\b(which|what) (company|organi[sz]ation|institution|university|agency|firm|team)\b",
            0.9,
        ),
        rule(
            Organization,
            "org_noun",
            r"\b(company|organi[sz]ation|corporation|institution|university|employer)\b",
            0.5,
        ),
        rule(
            Organization,
            "affiliation",
            r"\b(works? (at|for)|worked (at|for)|employed by|member of|affiliated with)\b",
            0.7,
        ),
        rule(Organization, "ownership", r"\b(acquired|owns|owned)\b", 0.3),
        rule(Location, "where", r"\bwhere\b", 0.9),
        rule(Location, "placement", r"\b(headquartered|located|based)\b", 0.9),
        rule(Location, "place_noun", r"\b(city|country|state|region|place)\b", 0.5),
        rule(Location, "residence", r"\b(born in|lives? in|moved to)\b", 0.6),
        rule(Date, "when", r"\bwhen\b", 0.9),
        rule(Date, "which_date", r"\bwhat (year|date|day|month|century)\b", 0.9),
        rule(Date, "date_noun", r"\b(year|date|since|until)\b", 0.4),
        rule(Date, "lifecycle", r"\b(founded|established|born|died)\b", 0.2),
        rule(Number, "how_many", r"\bhow (many|much)\b", 0.9),
        rule(Number, "how_old", r"\bhow old\b", 0.8),
        rule(
            Number,
            "quantity",
            r"\b(number of|count|amount|total|population|percentage)\b",
            0.6,
        ),
        rule(Event, "what_happened", r"\bwhat happened\b", 0.9),
        rule(
            Event,
            "event_noun",
            r"\b(event|conference|war|battle|election|ceremony|summit)\b",
            0.6,
        ),
        rule(Event, "occurrence", r"\b(took place|occurred)\b", 0.5),
    ]
});

static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9'-]+").unwrap());

/// Classifies questions into an [`ExpectedType`].
pub struct IntentAnalyzer {
    taxonomy: Arc<Taxonomy>,
}

impl IntentAnalyzer {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    /// Score every category and pick the expected answer type.
    pub fn analyze(&self, query: &str) -> IntentAnalysis {
        let lower = query.to_lowercase();
        let mut diagnostics = IntentDiagnostics::default();
        let mut scores: BTreeMap<ExpectedType, f64> =
            ExpectedType::CATEGORIES.iter().map(|c| (*c, 0.0)).collect();

        for r in RULES.iter() {
            if r.pattern.is_match(&lower) {
                *scores.entry(r.category).or_default() += r.weight;
                diagnostics
                    .matched_rules
                    .push(format!("{}:{}", r.category, r.name));
            }
        }

        let tokens: Vec<String> = TOKEN_SPLIT
            .split(&lower)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let boosts = [
            (ExpectedType::Person, ROLE_BOOST, self.taxonomy.role_hits(&tokens)),
            (ExpectedType::Location, LOCATION_BOOST, self.taxonomy.location_hits(&tokens)),
            (ExpectedType::Date, TEMPORAL_BOOST, self.taxonomy.temporal_hits(&tokens)),
        ];
        for (category, boost, hits) in boosts {
            if !hits.is_empty() {
                *scores.entry(category).or_default() += boost;
                let mut words: Vec<&str> = hits.into_iter().collect();
                words.sort_unstable();
                diagnostics
                    .boosts
                    .push(format!("{}+{} ({})", category, boost, words.join(",")));
            }
        }

        // First category in tie-break order wins an exact tie.
        let (primary, max) = ExpectedType::CATEGORIES
            .iter()
            .map(|c| (*c, scores.get(c).copied().unwrap_or(0.0)))
            .fold((ExpectedType::Unknown, 0.0), |best, (c, s)| {
                if s > best.1 {
                    (c, s)
                } else {
                    best
                }
            });
        diagnostics.scores = scores;

        if max <= 0.0 {
            debug!("Intent: no rule matched for {:?}", query);
            return IntentAnalysis::unknown(diagnostics);
        }

        let runners_up: Vec<ExpectedType> = ExpectedType::CATEGORIES
            .iter()
            .copied()
            .filter(|c| *c != primary)
            .filter(|c| {
                let s = diagnostics.scores.get(c).copied().unwrap_or(0.0);
                s >= MULTIPLE_RATIO * max && s > MULTIPLE_FLOOR
            })
            .collect();
        let confidence = (max / 2.0).min(1.0);

        let analysis = if runners_up.is_empty() {
            IntentAnalysis {
                expected_type: primary,
                primary_type: None,
                possible_types: Vec::new(),
                confidence,
                diagnostics,
            }
        } else {
            let mut possible_types = vec![primary];
            possible_types.extend(runners_up);
            IntentAnalysis {
                expected_type: ExpectedType::Multiple,
                primary_type: Some(primary),
                possible_types,
                confidence,
                diagnostics,
            }
        };
        debug!(
            "Intent: {} (confidence {:.2}, rules {:?})",
            analysis.expected_type, analysis.confidence, analysis.diagnostics.matched_rules
        );
        analysis
    }

    /// Entity type tags acceptable for an expected type. Empty means any tag.
    pub fn compatible_entity_types(expected: ExpectedType) -> &'static [&'static str] {
        match expected {
            ExpectedType::Person => &["PERSON", "PER", "PEOPLE", "INDIVIDUAL"],
            ExpectedType::Organization => &["ORGANIZATION", "ORG", "COMPANY", "GPE", "INSTITUTION"],
            ExpectedType::Location => &["LOCATION", "LOC", "GPE", "PLACE", "FAC", "CITY", "COUNTRY"],
            ExpectedType::Date => &["DATE", "TIME", "YEAR"],
            ExpectedType::Number => &["NUMBER", "CARDINAL", "QUANTITY", "MONEY", "PERCENT"],
            ExpectedType::Event => &["EVENT"],
            ExpectedType::Unknown | ExpectedType::Multiple => &[],
        }
    }

    /// Whether `entity_type` satisfies `expected`.
    pub fn type_matches(expected: ExpectedType, entity_type: &str) -> bool {
        let compatible = Self::compatible_entity_types(expected);
        compatible.is_empty() || compatible.iter().any(|t| t.eq_ignore_ascii_case(entity_type))
    }

    /// How plausible `entity` is as the answer, in `[0, 1]`.
    ///
    /// Entities already named in the question are halved; central entities
    /// get up to +0.3.
    pub fn score_answer_relevance(entity: &Entity, expected: ExpectedType, query: &str) -> f64 {
        let mut score = match expected {
            ExpectedType::Unknown | ExpectedType::Multiple => 0.3,
            t if Self::compatible_entity_types(t)
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&entity.entity_type)) =>
            {
                0.7
            }
            _ => 0.0,
        };

        let name = entity.canonical_name.trim().to_lowercase();
        if !name.is_empty() && query.to_lowercase().contains(&name) {
            score *= 0.5;
        }

        score += (entity.centrality_score.unwrap_or(0.0) * 10.0).min(0.3);
        score.clamp(0.0, 1.0)
    }
}
