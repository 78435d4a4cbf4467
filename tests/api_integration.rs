//! Integration tests for API endpoints.
//!
//! The engine runs in memory with the hashing embedder, so no model files or
//! data directory are needed.

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use mood_recommender::config::AppConfig;
use mood_recommender::engine::{IngestOutcome, IngestReport, RebuildReport};
use mood_recommender::index::IndexStats;
use mood_recommender::profile::ProfileSummary;
use mood_recommender::server::{create_router, AppState};
use mood_recommender::types::{
    ClassifyEmotionResponse, EmbedTextResponse, EmotionCategoriesResponse, HealthResponse,
    HealthStatus, ProfileResponse, RebuildIndexRequest,
};
use mood_recommender::{Emotion, RecommendationEngine, Recommendations, TitleKind, TitleRecord};

fn create_test_server() -> TestServer {
    let mut config = AppConfig::default();
    config.embedding.dimensions = 64;
    let engine = RecommendationEngine::in_memory(config).unwrap();
    let app = create_router(AppState::new(Arc::new(engine)));
    TestServer::new(app).unwrap()
}

/// Helper to create msgpack bytes
fn msgpack_bytes<T: serde::Serialize>(value: &T) -> Bytes {
    Bytes::from(rmp_serde::to_vec_named(value).unwrap())
}

fn decode<T: DeserializeOwned>(response: &TestResponse) -> T {
    rmp_serde::from_slice(response.as_bytes()).unwrap()
}

fn error_code(response: &TestResponse) -> String {
    let body: serde_json::Value = decode(response);
    body["error"]["code"].as_str().unwrap_or_default().to_string()
}

async fn post<T: serde::Serialize>(server: &TestServer, path: &str, body: &T) -> TestResponse {
    server
        .post(path)
        .content_type("application/msgpack")
        .bytes(msgpack_bytes(body))
        .await
}

async fn seed_catalog(server: &TestServer) {
    let titles = [
        TitleRecord::new("joy", TitleKind::Movie, "Sunny Side")
            .with_synopsis("A joyful, cheerful comedy full of laughs")
            .with_genres(["Comedy"]),
        TitleRecord::new("tears", TitleKind::Movie, "Grey Harbour")
            .with_synopsis("A grieving widow faces sorrow and heartbreak")
            .with_genres(["Drama"]),
        TitleRecord::new("plain", TitleKind::Series, "Ledger")
            .with_synopsis("Accountants audit municipal records")
            .with_networks(["PBS"]),
    ];
    for title in &titles {
        post(server, "/api/v1/titles", title).await.assert_status_ok();
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/api/v1/health").await;

    response.assert_status_ok();
    let content_type = response.headers().get("content-type");
    assert!(content_type.is_some());
    assert!(content_type.unwrap().to_str().unwrap().contains("msgpack"));

    let health: HealthResponse = decode(&response);
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.titles, 0);
    assert_eq!(health.classifier, "lexicon");
}

#[tokio::test]
async fn test_classify_emotion() {
    let server = create_test_server();

    let response = post(
        &server,
        "/api/v1/emotion/classify",
        &serde_json::json!({ "text": "I feel so sad and lonely tonight" }),
    )
    .await;

    response.assert_status_ok();
    let body: ClassifyEmotionResponse = decode(&response);
    assert!(matches!(body.dominant, Some(Emotion::Sad | Emotion::Lonely)));
    assert!(body.emotion.iter().all(|(_, w)| w >= 0.0));
    assert!(body.valence < 0.0);
}

#[tokio::test]
async fn test_classify_empty_text_is_rejected() {
    let server = create_test_server();

    let response = post(
        &server,
        "/api/v1/emotion/classify",
        &serde_json::json!({ "text": "   " }),
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "CLASSIFICATION_ERROR");
}

#[tokio::test]
async fn test_emotion_categories() {
    let server = create_test_server();

    let response = server.get("/api/v1/emotion/categories").await;

    response.assert_status_ok();
    let body: EmotionCategoriesResponse = decode(&response);
    assert_eq!(body.categories.len(), Emotion::COUNT);
}

#[tokio::test]
async fn test_embed_text() {
    let server = create_test_server();

    let response = post(
        &server,
        "/api/v1/embed/text",
        &serde_json::json!({ "text": "a quiet night in" }),
    )
    .await;

    response.assert_status_ok();
    let body: EmbedTextResponse = decode(&response);
    assert_eq!(body.dimensions, 64);
    assert_eq!(body.embedding.len(), 64);
}

#[tokio::test]
async fn test_invalid_msgpack() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/embed/text")
        .content_type("application/msgpack")
        .bytes(Bytes::from_static(b"not msgpack"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "SERIALIZATION_ERROR");
}

#[tokio::test]
async fn test_ingest_and_remove_title() {
    let server = create_test_server();

    let record = TitleRecord::new("t1", TitleKind::Movie, "Night Train");
    let response = post(&server, "/api/v1/titles", &record).await;
    response.assert_status_ok();
    let report: IngestReport = decode(&response);
    assert_eq!(report.outcome, IngestOutcome::Inserted);

    let stats: IndexStats = decode(&server.get("/api/v1/index/stats").await);
    assert_eq!(stats.entries, 1);

    server.delete("/api/v1/titles/t1").await.assert_status_ok();
    server
        .delete("/api/v1/titles/t1")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ingest_invalid_title() {
    let server = create_test_server();

    let response = post(
        &server,
        "/api/v1/titles",
        &TitleRecord::new("t1", TitleKind::Movie, " "),
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "INVALID_TITLE");
}

#[tokio::test]
async fn test_recommend_for_sad_mood() {
    let server = create_test_server();
    seed_catalog(&server).await;

    let response = post(
        &server,
        "/api/v1/users/alice/recommend",
        &serde_json::json!({ "mood_text": "I feel so sad and heartbroken tonight" }),
    )
    .await;

    response.assert_status_ok();
    let recs: Recommendations = decode(&response);
    assert_eq!(recs.results[0].title_id, "tears");
    assert!(recs
        .results
        .iter()
        .all(|r| r.components.collaborative == 0.0));
}

#[tokio::test]
async fn test_recommend_without_signal_fails() {
    let server = create_test_server();
    seed_catalog(&server).await;

    let response = post(
        &server,
        "/api/v1/users/nobody/recommend",
        &serde_json::json!({}),
    )
    .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(&response), "RECOMMENDATION_UNAVAILABLE");
}

#[tokio::test]
async fn test_feedback_updates_profile() {
    let server = create_test_server();
    seed_catalog(&server).await;

    let response = post(
        &server,
        "/api/v1/users/bob/feedback",
        &serde_json::json!({ "title_id": "joy", "action": "liked", "strength": 1.0 }),
    )
    .await;
    response.assert_status_ok();
    let summary: ProfileSummary = decode(&response);
    assert_eq!(summary.update_count, 1);
    assert!(!summary.is_cold);

    let response = server
        .get("/api/v1/users/bob/profile")
        .add_query_param("include_vector", "true")
        .await;
    response.assert_status_ok();
    let profile: ProfileResponse = decode(&response);
    assert_eq!(profile.profile.version, 1);
    assert_eq!(profile.preference.map(|p| p.len()), Some(64));

    let response = server.post("/api/v1/users/bob/profile/recompute").await;
    response.assert_status_ok();
    let recomputed: ProfileSummary = decode(&response);
    assert_eq!(recomputed.update_count, 1);
}

#[tokio::test]
async fn test_feedback_unknown_title() {
    let server = create_test_server();

    let response = post(
        &server,
        "/api/v1/users/bob/feedback",
        &serde_json::json!({ "title_id": "missing", "action": "liked" }),
    )
    .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response), "UNKNOWN_TITLE");
}

#[tokio::test]
async fn test_feedback_invalid_strength() {
    let server = create_test_server();
    seed_catalog(&server).await;

    let response = post(
        &server,
        "/api/v1/users/bob/feedback",
        &serde_json::json!({ "title_id": "joy", "action": "rated", "strength": 4.0 }),
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rebuild_index_from_catalog() {
    let server = create_test_server();
    seed_catalog(&server).await;

    let response = post(
        &server,
        "/api/v1/index/rebuild",
        &RebuildIndexRequest::default(),
    )
    .await;

    response.assert_status_ok();
    let report: RebuildReport = decode(&response);
    assert_eq!(report.titles, 3);
}

#[tokio::test]
async fn test_search_effort() {
    let server = create_test_server();

    let response = post(
        &server,
        "/api/v1/index/search-effort",
        &serde_json::json!({ "effort": 200 }),
    )
    .await;
    response.assert_status_ok();
    let stats: IndexStats = decode(&response);
    assert_eq!(stats.search_effort, 200);

    post(
        &server,
        "/api/v1/index/search-effort",
        &serde_json::json!({ "effort": 0 }),
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_nonexistent_endpoint() {
    let server = create_test_server();

    let response = server.get("/api/v1/nonexistent").await;

    response.assert_status_not_found();
}
