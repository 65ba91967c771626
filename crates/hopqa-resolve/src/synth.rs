//! Templated natural-language answers from ranked results.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::types::AnswerResult;

pub const NO_ANSWER: &str =
    "I couldn't find relevant information to answer that question in the knowledge graph.";
const MAX_NAMED: usize = 3;
const MAX_ANSWER_CONFIDENCE: f64 = 0.9;

/// Surface form of the question, which picks the answer template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerTemplate {
    Definition,
    Process,
    Causal,
    Identification,
    Relationship,
}

static DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(what (is|are)\b|define\b)|\bdefinition of\b").unwrap());
static PROCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*how\b|\bprocess\b").unwrap());
static CAUSAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(why|because)\b").unwrap());
static IDENTIFICATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(who|which|what)\b").unwrap());

impl AnswerTemplate {
    pub fn for_query(query: &str) -> Self {
        let lower = query.to_lowercase();
        if DEFINITION.is_match(&lower) {
            Self::Definition
        } else if PROCESS.is_match(&lower) {
            Self::Process
        } else if CAUSAL.is_match(&lower) {
            Self::Causal
        } else if IDENTIFICATION.is_match(&lower) {
            Self::Identification
        } else {
            Self::Relationship
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Synthesis {
    pub answer: String,
    pub confidence: f64,
    pub template: AnswerTemplate,
}

pub struct AnswerSynthesizer;

impl AnswerSynthesizer {
    /// Fill the template for `query` with the top distinct answers.
    pub fn synthesize(query: &str, results: &[AnswerResult]) -> Synthesis {
        let template = AnswerTemplate::for_query(query);
        let Some(top) = results.first() else {
            return Synthesis {
                answer: NO_ANSWER.to_string(),
                confidence: 0.0,
                template,
            };
        };

        let mut names: Vec<&str> = Vec::new();
        for r in results {
            if names.len() == MAX_NAMED {
                break;
            }
            if !names.contains(&r.answer_entity.as_str()) {
                names.push(&r.answer_entity);
            }
        }
        let list = join_names(&names);
        let subject = top.source_entity.as_str();
        let relation = top
            .relationship
            .as_deref()
            .map(humanize)
            .unwrap_or_else(|| "a relationship".to_string());

        let answer = match template {
            AnswerTemplate::Definition => format!(
                "Based on the knowledge graph, {} is most closely associated with {}.",
                subject, list
            ),
            AnswerTemplate::Process => format!(
                "{} connects to {} through \"{}\" ({}).",
                subject, list, relation, top.path_rendering
            ),
            AnswerTemplate::Causal => format!(
                "{} is linked to {} via \"{}\", which may explain the connection ({}).",
                subject, list, relation, top.path_rendering
            ),
            AnswerTemplate::Identification => format!(
                "Based on the knowledge graph, the answer is {} ({}).",
                list, top.path_rendering
            ),
            AnswerTemplate::Relationship => format!(
                "{} is related to {} through \"{}\" ({}).",
                subject, list, relation, top.path_rendering
            ),
        };

        Synthesis {
            answer,
            confidence: top.confidence.min(MAX_ANSWER_CONFIDENCE),
            template,
        }
    }
}

/// `FOUNDED_BY` → `founded by`.
fn humanize(rel_type: &str) -> String {
    rel_type.replace(['_', '-'], " ").trim().to_lowercase()
}

fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, confidence: f64) -> AnswerResult {
        AnswerResult {
            rank: 1,
            answer_entity: name.into(),
            answer_entity_id: name.to_lowercase(),
            entity_type: "PERSON".into(),
            source_entity: "Carter Center".into(),
            relationship: Some("FOUNDED_BY".into()),
            path_rendering: format!("Carter Center -[FOUNDED_BY]-> {}", name),
            hops: 1,
            raw_score: 0.0,
            relevance_score: 0.0,
            final_score: confidence,
            confidence,
            type_match: true,
        }
    }

    #[test]
    fn test_template_selection() {
        assert_eq!(AnswerTemplate::for_query("What is GR?"), AnswerTemplate::Definition);
        assert_eq!(AnswerTemplate::for_query("Define entropy"), AnswerTemplate::Definition);
        assert_eq!(AnswerTemplate::for_query("How does it work?"), AnswerTemplate::Process);
        assert_eq!(AnswerTemplate::for_query("Why did it fail?"), AnswerTemplate::Causal);
        assert_eq!(
            AnswerTemplate::for_query("Who founded the Carter Center?"),
            AnswerTemplate::Identification
        );
        assert_eq!(
            AnswerTemplate::for_query("Carter Center and Atlanta"),
            AnswerTemplate::Relationship
        );
    }

    #[test]
    fn test_no_results() {
        let s = AnswerSynthesizer::synthesize("Who invented Xylophonia?", &[]);
        assert!(s.answer.starts_with("I couldn't find relevant information"));
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn test_identification_lists_distinct_names() {
        let results = vec![
            result("Jimmy Carter", 0.93),
            result("Jimmy Carter", 0.8),
            result("Rosalynn Carter", 0.7),
        ];
        let s = AnswerSynthesizer::synthesize("Who founded the Carter Center?", &results);
        assert!(s.answer.contains("Jimmy Carter and Rosalynn Carter"));
        assert!(s.answer.contains("-[FOUNDED_BY]->"));
        assert_eq!(s.confidence, 0.9);
    }

    #[test]
    fn test_relationship_label_humanized() {
        let s = AnswerSynthesizer::synthesize("Carter Center links", &[result("A", 0.4)]);
        assert!(s.answer.contains("\"founded by\""));
        assert_eq!(s.confidence, 0.4);
        assert_eq!(join_names(&["A", "B", "C"]), "A, B and C");
    }
}
