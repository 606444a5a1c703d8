//! Route handlers.

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::extract::State;
use axum::response::Json;
use deepresearch_core::{
    Error, ResearchRequest, ResearchResult, Suggestion, SuggestionRequest, SuggestionResponse,
};
use deepresearch_loader::LoadStatus;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::SharedState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `unloaded`, `loading`, `loaded` or `failed`
    pub state: String,
    /// Research capability this process builds
    pub mode: String,
    pub constructions: usize,
    pub hints_applied: bool,
    /// Load failure message, when `state` is `failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub status: String,
}

pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Deep Researcher API is running!".into(),
        status: "healthy".into(),
    })
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        message: "API is running".into(),
    })
}

/// Loader snapshot. Never starts a load.
pub async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let status = state.loader.status();
    let stats = state.loader.stats();
    let detail = match &status {
        LoadStatus::Failed(err) => Some(err.to_string()),
        _ => None,
    };

    Json(StatusResponse {
        state: status.as_str().into(),
        mode: state.loader.capability_name().into(),
        constructions: stats.constructions,
        hints_applied: stats.hint_applications > 0,
        detail,
    })
}

/// Run a research query, loading the capability on first use.
///
/// The query is validated before the loader is touched, so a bad request
/// never triggers construction.
pub async fn research_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<ResearchResult>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;
    info!(session = ?request.session_id, "Research request");

    let capability = state.loader.acquire().await.map_err(|e| {
        error!(error = %e, "Research capability unavailable");
        ApiError::from(e)
    })?;

    let result = capability.process(&request.query).await.map_err(Error::Research)?;

    debug!(
        findings = result.findings.len(),
        confidence = result.confidence,
        "Research complete"
    );
    Ok(Json(result))
}

/// Suggest a refined query. Works without the research capability.
pub async fn suggest_handler(
    payload: Result<Json<SuggestionRequest>, JsonRejection>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    let Json(request) = payload?;
    debug!(session = ?request.session_id, "Suggestion request");

    Ok(Json(SuggestionResponse {
        success: true,
        suggestions: vec![Suggestion::specificity(&request.query)],
    }))
}

/// Upload stub: accepts any payload and stores nothing.
pub async fn upload_handler(
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let body = body?;
    debug!(bytes = body.len(), "Upload received (not persisted)");

    Ok(Json(UploadResponse {
        message: "Document upload endpoint".into(),
        status: "ready".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use deepresearch_core::{
        CapabilityFactory, MemoryProfile, ResearchCapability, ResearchError,
    };
    use deepresearch_loader::{HintApplier, ResourceLoader};
    use deepresearch_providers::PlaceholderFactory;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::error::{ErrorResponse, GENERIC_DETAIL};
    use crate::{GatewayState, build_router};

    struct NoHints;

    impl HintApplier for NoHints {
        fn apply(&self, _profile: &MemoryProfile) {}
    }

    /// Factory that always fails construction.
    struct BrokenFactory;

    impl CapabilityFactory for BrokenFactory {
        fn name(&self) -> &str {
            "broken"
        }

        fn build(
            &self,
            _profile: &MemoryProfile,
        ) -> Result<Arc<dyn ResearchCapability>, ResearchError> {
            Err(ResearchError::ModelNotFound("weights missing".into()))
        }
    }

    enum Misbehaviour {
        Fails,
        Panics,
    }

    /// Loads fine but misbehaves on every query.
    struct FlakyCapability(Misbehaviour);

    #[async_trait]
    impl ResearchCapability for FlakyCapability {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn process(&self, _query: &str) -> Result<ResearchResult, ResearchError> {
            match self.0 {
                Misbehaviour::Fails => Err(ResearchError::Processing(
                    "index file /var/secret/corpus.bin is corrupt".into(),
                )),
                Misbehaviour::Panics => panic!("ranking overflowed"),
            }
        }
    }

    struct FlakyFactory(fn() -> Misbehaviour);

    impl CapabilityFactory for FlakyFactory {
        fn name(&self) -> &str {
            "flaky"
        }

        fn build(
            &self,
            _profile: &MemoryProfile,
        ) -> Result<Arc<dyn ResearchCapability>, ResearchError> {
            Ok(Arc::new(FlakyCapability((self.0)())))
        }
    }

    fn setup(factory: Arc<dyn CapabilityFactory>) -> (Router, Arc<ResourceLoader>) {
        let loader = Arc::new(ResourceLoader::new(factory).with_hint_applier(Arc::new(NoHints)));
        let app = build_router(GatewayState::new(Arc::clone(&loader)), 10 * 1024 * 1024);
        (app, loader)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn root_reports_running() {
        let (app, loader) = setup(Arc::new(PlaceholderFactory));
        let (status, body) = send(&app, get("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Deep Researcher API is running!");
        assert_eq!(body["status"], "healthy");
        assert_eq!(loader.stats().constructions, 0);
    }

    #[tokio::test]
    async fn research_returns_placeholder_findings() {
        let (app, loader) = setup(Arc::new(PlaceholderFactory));
        let (status, body) = send(
            &app,
            post_json("/research", json!({"query": "climate change"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let result: ResearchResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.query, "climate change");
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.sources, 1);
        assert!(result.findings[0].content.contains("climate change"));
        assert_eq!(result.findings[0].source, "Sample Document");
        assert_eq!(result.reasoning, "Analyzed query: climate change");
        assert_eq!(loader.stats().constructions, 1);
    }

    #[tokio::test]
    async fn research_echoes_query_as_sent() {
        let (app, _loader) = setup(Arc::new(PlaceholderFactory));
        let (status, body) = send(
            &app,
            post_json("/research", json!({"query": "  climate change "})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "  climate change ");
        assert_eq!(body["reasoning"], "Analyzed query:   climate change ");
    }

    #[tokio::test]
    async fn repeated_research_builds_once() {
        let (app, loader) = setup(Arc::new(PlaceholderFactory));
        for query in ["first", "second", "third"] {
            let (status, _) = send(&app, post_json("/research", json!({ "query": query }))).await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(loader.stats().constructions, 1);
        assert_eq!(loader.stats().hint_applications, 1);
    }

    #[tokio::test]
    async fn empty_query_rejected_without_loading() {
        let (app, loader) = setup(Arc::new(PlaceholderFactory));

        for query in ["", "   \t\n"] {
            let (status, body) = send(&app, post_json("/research", json!({ "query": query }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let err: ErrorResponse = serde_json::from_value(body).unwrap();
            assert!(err.detail.contains("query"));
        }

        assert_eq!(loader.status(), LoadStatus::Unloaded);
        assert_eq!(loader.stats().constructions, 0);
    }

    #[tokio::test]
    async fn missing_query_is_client_error() {
        let (app, loader) = setup(Arc::new(PlaceholderFactory));
        let (status, body) = send(&app, post_json("/research", json!({"session_id": "s1"}))).await;

        assert!(status.is_client_error());
        assert!(body["detail"].as_str().is_some());
        assert_eq!(loader.stats().constructions, 0);
    }

    #[tokio::test]
    async fn malformed_json_is_client_error() {
        let (app, _loader) = setup(Arc::new(PlaceholderFactory));
        let req = Request::builder()
            .method("POST")
            .uri("/research")
            .header("content-type", "application/json")
            .body(Body::from("{\"query\": "))
            .unwrap();

        let (status, body) = send(&app, req).await;
        assert!(status.is_client_error());
        assert!(body["detail"].as_str().is_some());
    }

    #[tokio::test]
    async fn load_failure_is_sticky_and_replayed() {
        let (app, loader) = setup(Arc::new(BrokenFactory));

        let (first_status, first) =
            send(&app, post_json("/research", json!({"query": "a"}))).await;
        let (second_status, second) =
            send(&app, post_json("/research", json!({"query": "b"}))).await;

        assert_eq!(first_status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(second_status, StatusCode::INTERNAL_SERVER_ERROR);
        let detail = first["detail"].as_str().unwrap();
        assert!(detail.starts_with("Failed to load agent"));
        assert!(detail.contains("weights missing"));
        assert_eq!(first, second);
        assert_eq!(loader.stats().constructions, 1);
    }

    #[tokio::test]
    async fn other_routes_survive_load_failure() {
        let (app, _loader) = setup(Arc::new(BrokenFactory));
        let (status, _) = send(&app, post_json("/research", json!({"query": "a"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["message"], "API is running");

        let (status, _) = send(&app, post_json("/suggest", json!({"query": "AI"}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn processing_error_detail_is_generic() {
        let (app, _loader) = setup(Arc::new(FlakyFactory(|| Misbehaviour::Fails)));
        let (status, body) = send(&app, post_json("/research", json!({"query": "q"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], GENERIC_DETAIL);
    }

    #[tokio::test]
    async fn handler_panic_becomes_500() {
        let (app, loader) = setup(Arc::new(FlakyFactory(|| Misbehaviour::Panics)));
        let (status, body) = send(&app, post_json("/research", json!({"query": "q"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], GENERIC_DETAIL);

        // The capability itself stays loaded.
        assert_eq!(loader.status(), LoadStatus::Loaded);
        let (status, _) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn suggest_needs_no_capability() {
        let (app, loader) = setup(Arc::new(BrokenFactory));
        let (status, body) = send(&app, post_json("/suggest", json!({"query": "AI"}))).await;

        assert_eq!(status, StatusCode::OK);
        let response: SuggestionResponse = serde_json::from_value(body).unwrap();
        assert!(response.success);
        assert_eq!(response.suggestions.len(), 1);
        let suggestion = &response.suggestions[0];
        assert_eq!(suggestion.suggested_query, "More specific: AI");
        assert_eq!(suggestion.refinement_type, "specificity");
        assert_eq!(suggestion.confidence, 0.8);
        assert_eq!(suggestion.expected_improvement, 0.15);

        assert_eq!(loader.status(), LoadStatus::Unloaded);
        assert_eq!(loader.stats().constructions, 0);
    }

    #[tokio::test]
    async fn upload_accepts_any_payload() {
        let (app, loader) = setup(Arc::new(PlaceholderFactory));

        let with_body = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", "application/octet-stream")
            .body(Body::from(vec![0u8, 159, 146, 150]))
            .unwrap();
        let empty = Request::builder()
            .method("POST")
            .uri("/upload")
            .body(Body::empty())
            .unwrap();

        for req in [with_body, empty] {
            let (status, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], "Document upload endpoint");
            assert_eq!(body["status"], "ready");
        }
        assert_eq!(loader.stats().constructions, 0);
    }

    #[tokio::test]
    async fn oversized_upload_rejected_with_detail() {
        let loader = Arc::new(
            ResourceLoader::new(Arc::new(PlaceholderFactory)).with_hint_applier(Arc::new(NoHints)),
        );
        let app = build_router(GatewayState::new(loader), 16);
        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();

        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["detail"].as_str().is_some());
    }

    #[tokio::test]
    async fn status_tracks_loader_lifecycle() {
        let (app, _loader) = setup(Arc::new(PlaceholderFactory));

        let (status, before) = send(&app, get("/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(before["state"], "unloaded");
        assert_eq!(before["mode"], "placeholder");
        assert_eq!(before["constructions"], 0);
        assert_eq!(before["hints_applied"], false);
        assert!(before.get("detail").is_none());

        send(&app, post_json("/research", json!({"query": "q"}))).await;

        let (_, after) = send(&app, get("/status")).await;
        assert_eq!(after["state"], "loaded");
        assert_eq!(after["constructions"], 1);
        assert_eq!(after["hints_applied"], true);
    }

    #[tokio::test]
    async fn status_reports_failure_detail() {
        let (app, _loader) = setup(Arc::new(BrokenFactory));
        send(&app, post_json("/research", json!({"query": "q"}))).await;

        let (status, body) = send(&app, get("/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "failed");
        assert!(body["detail"].as_str().unwrap().contains("weights missing"));
    }

    #[tokio::test]
    async fn reset_allows_one_retry_over_http() {
        let (app, loader) = setup(Arc::new(BrokenFactory));
        send(&app, post_json("/research", json!({"query": "q"}))).await;
        assert!(loader.reset());

        let (status, _) = send(&app, post_json("/research", json!({"query": "q"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(loader.stats().constructions, 2);
    }
}
