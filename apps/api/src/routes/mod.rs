pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{ats, history, oracle, revision};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/revisions",
            post(revision::handlers::handle_revise),
        )
        .route("/api/v1/ats/score", post(ats::handlers::handle_score))
        .route(
            "/api/v1/changes/propose",
            post(oracle::handlers::handle_propose),
        )
        .route("/api/v1/history", get(history::handlers::handle_list))
        .route(
            "/api/v1/history/current",
            get(history::handlers::handle_current),
        )
        .route("/api/v1/history/undo", post(history::handlers::handle_undo))
        .route("/api/v1/history/redo", post(history::handlers::handle_redo))
        .route(
            "/api/v1/history/:id",
            get(history::handlers::handle_get_version),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::ats::engine::AtsEngine;
    use crate::config::Config;
    use crate::history::service::HistoryService;
    use crate::history::store::InMemoryHistoryStore;
    use crate::models::history::Artifact;
    use crate::models::resume::ResumeDocument;
    use crate::oracle::{ChangeOracle, OracleError, ProposalService};
    use crate::rate_limit::{InMemoryRateLimitStore, RateGuard};
    use crate::render::{ArtifactRenderer, RenderError, Theme};
    use crate::revision::applicator::{AppendPolicy, DiffApplicator};
    use crate::revision::changes::ProposedChange;
    use crate::revision::pipeline::RevisionPipeline;
    use crate::state::AppState;

    struct NoRender;

    #[async_trait]
    impl ArtifactRenderer for NoRender {
        async fn render(
            &self,
            _: Uuid,
            _: Uuid,
            _: &ResumeDocument,
            _: Theme,
        ) -> Result<Vec<Artifact>, RenderError> {
            Ok(Vec::new())
        }
    }

    struct SilentOracle;

    #[async_trait]
    impl ChangeOracle for SilentOracle {
        async fn propose(
            &self,
            _: &ResumeDocument,
            _: Option<&str>,
        ) -> Result<Vec<ProposedChange>, OracleError> {
            Err(OracleError::Timeout)
        }
    }

    fn config(max_requests: u32) -> Config {
        Config {
            database_url: None,
            redis_url: None,
            s3_bucket: "test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            anthropic_api_key: "test".to_string(),
            port: 0,
            rust_log: "info".to_string(),
            rate_limit_max_requests: max_requests,
            rate_limit_window_ms: 60_000,
            propose_rate_limit_max_requests: 1,
            rate_limit_sweep_secs: 60,
            scoring_timeout_ms: 5_000,
            oracle_timeout_ms: 1_000,
            append_policy: AppendPolicy::Always,
        }
    }

    fn app(max_requests: u32) -> Router {
        let engine = Arc::new(AtsEngine::new());
        let history = Arc::new(HistoryService::new(Arc::new(InMemoryHistoryStore::new())));
        let pipeline = Arc::new(RevisionPipeline::new(
            DiffApplicator::new(AppendPolicy::Always),
            Arc::clone(&engine),
            Arc::clone(&history),
            Arc::new(NoRender),
            Duration::from_secs(5),
        ));
        build_router(AppState {
            config: config(max_requests),
            engine,
            history,
            pipeline,
            proposals: Arc::new(ProposalService::new(
                Arc::new(SilentOracle),
                Duration::from_secs(1),
            )),
            rate_guard: Arc::new(RateGuard::new(Arc::new(InMemoryRateLimitStore::new()))),
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn revision_body(user_id: Uuid) -> Value {
        json!({
            "user_id": user_id,
            "document": { "summary": "Experienced engineer" },
            "changes": [{
                "id": "c1",
                "scope": "paragraph",
                "before": "Experienced engineer",
                "after": "Senior engineer with 8 years",
            }],
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(5), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "revision-api");
    }

    #[tokio::test]
    async fn test_revise_then_undo_via_http() {
        let app = app(5);
        let user = Uuid::new_v4();

        let (status, first) = send(&app, "POST", "/api/v1/revisions", Some(revision_body(user))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["document"]["summary"], "Senior engineer with 8 years");
        assert_eq!(first["cursor"], 0);
        assert_eq!(first["committed"], true);

        let (status, _) = send(&app, "POST", "/api/v1/revisions", Some(revision_body(user))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, listing) = send(&app, "GET", &format!("/api/v1/history?user_id={user}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["versions"].as_array().unwrap().len(), 2);
        assert_eq!(listing["cursor"], 1);

        let (status, undo) = send(&app, "POST", "/api/v1/history/undo", Some(json!({ "user_id": user }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(undo["cursor"], 0);
        assert_eq!(undo["entry"]["id"], first["history_entry_id"]);

        let (_, undo) = send(&app, "POST", "/api/v1/history/undo", Some(json!({ "user_id": user }))).await;
        assert_eq!(undo["boundary"], "nothing_to_undo");

        let id = first["history_entry_id"].as_str().unwrap();
        let (status, _) = send(&app, "GET", &format!("/api/v1/history/{id}?user_id={user}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_version_is_not_found() {
        let app = app(5);
        let uri = format!("/api/v1/history/{}?user_id={}", Uuid::new_v4(), Uuid::new_v4());
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_quota_exhaustion_returns_429() {
        let app = app(1);
        let user = Uuid::new_v4();
        let (status, _) = send(&app, "POST", "/api/v1/revisions", Some(revision_body(user))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "POST", "/api/v1/revisions", Some(revision_body(user))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
        assert_eq!(body["error"]["retryable"], true);
        assert_eq!(body["error"]["remaining"], 0);
    }

    #[tokio::test]
    async fn test_score_endpoint_does_not_commit() {
        let app = app(5);
        let user = Uuid::new_v4();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/ats/score",
            Some(json!({
                "user_id": user,
                "before": "Backend engineer building payment APIs in Rust since 2019",
                "job_description": "Rust Engineer\nPayment APIs",
                "baseline_score": 10,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"]["before"], 10);
        let score = body["ats"]["ats_score_optimized"].as_u64().unwrap();
        assert!(score <= 100);

        let (status, _) = send(&app, "GET", &format!("/api/v1/history/current?user_id={user}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oracle_timeout_maps_to_504() {
        let app = app(5);
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/changes/propose",
            Some(json!({
                "user_id": Uuid::new_v4(),
                "document": { "summary": "Backend engineer" },
            })),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["code"], "ORACLE_TIMEOUT");
        assert_eq!(body["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn test_empty_change_batch_is_rejected() {
        let app = app(5);
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/revisions",
            Some(json!({
                "user_id": Uuid::new_v4(),
                "document": { "summary": "x" },
                "changes": [],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
