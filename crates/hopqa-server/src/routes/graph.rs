//! Graph maintenance and status routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hopqa_core::Error;
use serde::Deserialize;

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/graph/stats", get(graph_stats))
        .route("/centrality", post(recompute_centrality))
}

#[derive(Debug, Default, Deserialize)]
struct CentralityRequest {
    #[serde(default)]
    entity_type: Option<String>,
}

/// GET /api/health
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.count_entities() {
        Ok(entities) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "service": "hopqa",
                "entities": entities,
                "uptimeSeconds": state.started_at.elapsed().as_secs(),
            })),
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /api/graph/stats: store counts plus the last centrality run.
async fn graph_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = match state.store.stats() {
        Ok(s) => s,
        Err(e) => return error_response(&e),
    };
    let last = state.last_centrality.read().as_ref().map(|r| {
        serde_json::json!({
            "computedAt": r.computed_at.to_rfc3339(),
            "entityType": r.entity_type,
            "converged": r.converged,
            "iterations": r.iterations,
            "scoresWritten": r.scores_written,
            "graphMetrics": r.graph_metrics,
        })
    });

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "entities": stats.total_entities,
            "relationships": stats.total_relationships,
            "scoredEntities": stats.scored_entities,
            "dbPath": stats.db_path,
            "dbSizeMb": stats.db_size_mb,
            "lastCentrality": last,
        })),
    )
}

/// POST /api/centrality: recompute PageRank, optionally for one entity type.
///
/// The body is optional; `{}` or no body recomputes over the whole graph.
async fn recompute_centrality(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let req: CentralityRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CentralityRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => return error_response(&Error::Validation(format!("invalid body: {}", e))),
        }
    };

    match state.refresh_centrality(req.entity_type).await {
        Ok(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{call, seed_carter, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_centrality_on_empty_graph_is_graph_empty() {
        let (state, _dir) = test_state();
        let (status, body) = call(state, "POST", "/api/centrality", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "GRAPH_EMPTY");
    }

    #[tokio::test]
    async fn test_centrality_then_stats() {
        let (state, _dir) = test_state();
        seed_carter(&state);
        let (status, body) = call(state.clone(), "POST", "/api/centrality", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scoresWritten"], 3);
        assert_eq!(body["graphMetrics"]["nodeCount"], 3);
        assert_eq!(body["scores"][0]["entityId"], "center");

        let (status, stats) = call(state, "GET", "/api/graph/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["entities"], 3);
        assert_eq!(stats["relationships"], 2);
        assert_eq!(stats["scoredEntities"], 3);
        assert_eq!(stats["lastCentrality"]["scoresWritten"], 3);
        assert_eq!(stats["lastCentrality"]["graphMetrics"]["edgeCount"], 2);
    }

    #[tokio::test]
    async fn test_typed_centrality() {
        let (state, _dir) = test_state();
        seed_carter(&state);
        let (status, body) = call(
            state,
            "POST",
            "/api/centrality",
            Some(json!({ "entity_type": "PERSON" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entityType"], "PERSON");
        assert_eq!(body["scoresWritten"], 1);
    }

    #[tokio::test]
    async fn test_bad_centrality_body_is_400() {
        let (state, _dir) = test_state();
        let (status, _) = call(state, "POST", "/api/centrality", Some(json!("nope"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _dir) = test_state();
        seed_carter(&state);
        let (status, body) = call(state, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["entities"], 3);
    }
}
