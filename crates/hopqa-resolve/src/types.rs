//! Query-scoped types. None of these are persisted.

use std::collections::BTreeMap;

use hopqa_store::{HopDirection, PathHop, PathNode};
use serde::{Deserialize, Serialize};

/// Semantic category a question expects as its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpectedType {
    Person,
    Organization,
    Location,
    Date,
    Number,
    Event,
    Unknown,
    Multiple,
}

impl ExpectedType {
    /// Concrete categories, in tie-break order.
    pub const CATEGORIES: [ExpectedType; 6] = [
        Self::Person,
        Self::Organization,
        Self::Location,
        Self::Date,
        Self::Number,
        Self::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Organization => "ORGANIZATION",
            Self::Location => "LOCATION",
            Self::Date => "DATE",
            Self::Number => "NUMBER",
            Self::Event => "EVENT",
            Self::Unknown => "UNKNOWN",
            Self::Multiple => "MULTIPLE",
        }
    }
}

impl std::fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the analyzer decided what it did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntentDiagnostics {
    pub scores: BTreeMap<ExpectedType, f64>,
    pub matched_rules: Vec<String>,
    pub boosts: Vec<String>,
}

/// Output of intent analysis.
#[derive(Debug, Clone, Serialize)]
pub struct IntentAnalysis {
    pub expected_type: ExpectedType,
    /// Highest-scoring category when `expected_type` is `Multiple`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_type: Option<ExpectedType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub possible_types: Vec<ExpectedType>,
    pub confidence: f64,
    pub diagnostics: IntentDiagnostics,
}

impl IntentAnalysis {
    pub fn unknown(diagnostics: IntentDiagnostics) -> Self {
        Self {
            expected_type: ExpectedType::Unknown,
            primary_type: None,
            possible_types: Vec::new(),
            confidence: 0.0,
            diagnostics,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.expected_type != ExpectedType::Unknown
    }

    pub fn spans_multiple(&self) -> bool {
        self.expected_type == ExpectedType::Multiple
    }
}

/// An entity hypothesised to be mentioned by the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub entity_id: String,
    pub canonical_name: String,
    pub entity_type: String,
    pub matched_substring: String,
    pub match_quality: f64,
}

/// A scored traversal from a candidate to an answer endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Path {
    pub nodes: Vec<PathNode>,
    pub hops: Vec<PathHop>,
    pub raw_score: f64,
}

impl Path {
    /// Starting (query-side) entity.
    pub fn source(&self) -> &PathNode {
        &self.nodes[0]
    }

    /// Far endpoint, the answer proposed by this path.
    pub fn answer(&self) -> &PathNode {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Relationship type of the hop that reaches the answer.
    pub fn final_relationship(&self) -> Option<&str> {
        self.hops.last().map(|h| h.rel_type.as_str())
    }

    /// `Carter Center <-[FOUNDED]- Jimmy Carter` style rendering.
    pub fn render(&self) -> String {
        let mut out = self.nodes[0].name.clone();
        for (hop, node) in self.hops.iter().zip(self.nodes.iter().skip(1)) {
            match hop.direction {
                HopDirection::Forward => out.push_str(&format!(" -[{}]-> ", hop.rel_type)),
                HopDirection::Backward => out.push_str(&format!(" <-[{}]- ", hop.rel_type)),
            }
            out.push_str(&node.name);
        }
        out
    }
}

/// One ranked answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub rank: usize,
    pub answer_entity: String,
    pub answer_entity_id: String,
    pub entity_type: String,
    pub source_entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    pub path_rendering: String,
    pub hops: usize,
    pub raw_score: f64,
    pub relevance_score: f64,
    pub final_score: f64,
    pub confidence: f64,
    pub type_match: bool,
}

/// Entity mention reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct QueryEntity {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

impl From<&Candidate> for QueryEntity {
    fn from(c: &Candidate) -> Self {
        Self {
            id: c.entity_id.clone(),
            text: c.canonical_name.clone(),
            entity_type: c.entity_type.clone(),
        }
    }
}
