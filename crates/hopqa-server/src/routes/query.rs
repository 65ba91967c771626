//! Question answering route.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use hopqa_core::Error;
use hopqa_runtime::QueryRequest;
use tokio_util::sync::CancellationToken;

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/query", post(query))
}

/// POST /api/query: answer a natural-language question.
///
/// Dropping the request (client disconnect) cancels in-flight traversals.
///
/// Malformed bodies (missing `query_text`, wrong field types) are validation
/// errors with the usual `{error, code}` body.
async fn query(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let req: QueryRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(&Error::Validation(format!("invalid body: {}", e))),
    };

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.engine.query_with_cancel(req, cancel).await {
        Ok(response) => (StatusCode::OK, Json(serde_json::json!(response))),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{call, seed_carter, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_query_answers_founder() {
        let (state, _dir) = test_state();
        seed_carter(&state);
        let (status, body) = call(
            state,
            "POST",
            "/api/query",
            Some(json!({ "query_text": "Who founded the Carter Center?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["answer_entity"], "Jimmy Carter");
        assert_eq!(body["results"][0]["type_match"], true);
        assert!(body["answer"].as_str().unwrap().contains("Jimmy Carter"));
        assert!(body["paths_found"].as_u64().unwrap() >= 1);
        assert!(body["execution_time_seconds"].is_number());
        assert!(body["query_entities"][0]["type"].is_string());
    }

    #[tokio::test]
    async fn test_query_clamps_out_of_range() {
        let (state, _dir) = test_state();
        seed_carter(&state);
        let (status, body) = call(
            state,
            "POST",
            "/api/query",
            Some(json!({ "query_text": "Who founded the Carter Center?", "max_hops": 12, "result_limit": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["max_hops"], 3);
        assert_eq!(body["result_limit"], 1);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_400() {
        let (state, _dir) = test_state();
        let (status, body) = call(state, "POST", "/api/query", Some(json!({ "query_text": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let (state, _dir) = test_state();
        for body in [
            json!({ "max_hops": 2 }),
            json!({ "query_text": null }),
            json!({ "query_text": "Who?", "max_hops": "two" }),
        ] {
            let (status, resp) = call(state.clone(), "POST", "/api/query", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp["code"], "VALIDATION_ERROR");
            assert!(resp["error"].as_str().unwrap().contains("invalid body"));
        }
    }

    #[tokio::test]
    async fn test_no_match_is_empty_answer() {
        let (state, _dir) = test_state();
        seed_carter(&state);
        let (status, body) = call(
            state,
            "POST",
            "/api/query",
            Some(json!({ "query_text": "Who invented Xylophonia?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["paths_found"], 0);
        assert!(body["answer"]
            .as_str()
            .unwrap()
            .starts_with("I couldn't find relevant information"));
    }
}
