//! Scores paths into ranked answers.

use std::cmp::Ordering;
use std::collections::HashMap;

use hopqa_core::Result;
use hopqa_store::{Entity, GraphStore};
use tracing::warn;

use crate::intent::IntentAnalyzer;
use crate::types::{AnswerResult, IntentAnalysis, Path};

const RAW_WEIGHT: f64 = 0.3;
const RELEVANCE_WEIGHT: f64 = 0.7;
const MAX_RESULT_CONFIDENCE: f64 = 0.95;

pub struct Ranker<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> Ranker<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    /// Rank `paths` for `query` and keep the best `limit`.
    ///
    /// Answer entities are refreshed from the store in one batch; if that
    /// fails, the data carried on the paths is used instead.
    pub fn rank(
        &self,
        paths: &[Path],
        intent: &IntentAnalysis,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AnswerResult>> {
        if paths.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = paths.iter().map(|p| p.answer().name.clone()).collect();
        names.sort();
        names.dedup();
        let fresh: HashMap<String, Entity> = match self.store.bulk_get_by_name(&names) {
            Ok(entities) => entities.into_iter().map(|e| (e.id.clone(), e)).collect(),
            Err(e) => {
                warn!("Answer entity refresh failed, using path data: {}", e);
                HashMap::new()
            }
        };

        let mut results: Vec<AnswerResult> = paths
            .iter()
            .map(|path| score_path(path, fresh.get(&path.answer().id), intent, query))
            .collect();

        results.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.answer_entity_id.cmp(&b.answer_entity_id))
                .then_with(|| a.path_rendering.cmp(&b.path_rendering))
        });
        results.truncate(limit);
        for (i, r) in results.iter_mut().enumerate() {
            r.rank = i + 1;
        }
        Ok(results)
    }
}

fn score_path(path: &Path, fresh: Option<&Entity>, intent: &IntentAnalysis, query: &str) -> AnswerResult {
    let answer = path.answer();
    let entity = fresh.cloned().unwrap_or_else(|| Entity {
        id: answer.id.clone(),
        canonical_name: answer.name.clone(),
        entity_type: answer.entity_type.clone(),
        confidence: 1.0,
        centrality_score: answer.centrality_score,
    });

    let relevance_score = if intent.is_classified() {
        IntentAnalyzer::score_answer_relevance(&entity, intent.expected_type, query)
    } else {
        (path.raw_score * 2.0).min(1.0)
    };
    let final_score = (RAW_WEIGHT * path.raw_score + RELEVANCE_WEIGHT * relevance_score).clamp(0.0, 1.0);

    AnswerResult {
        rank: 0,
        answer_entity: entity.canonical_name,
        answer_entity_id: entity.id,
        type_match: IntentAnalyzer::type_matches(intent.expected_type, &entity.entity_type),
        entity_type: entity.entity_type,
        source_entity: path.source().name.clone(),
        relationship: path.final_relationship().map(str::to_string),
        path_rendering: path.render(),
        hops: path.hop_count(),
        raw_score: path.raw_score,
        relevance_score,
        final_score,
        confidence: final_score.min(MAX_RESULT_CONFIDENCE),
    }
}
