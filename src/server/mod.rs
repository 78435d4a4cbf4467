//! HTTP server setup and routing.

mod emotion;
mod extractors;
mod routes;
mod titles;
mod users;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::engine::RecommendationEngine;
use crate::error::AppError;

pub use extractors::{MsgPack, MsgPackExtractor};

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    /// Server start time for uptime calculation
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<RecommendationEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Run a synchronous engine call on the blocking pool
    pub(crate) async fn blocking<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&RecommendationEngine) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| AppError::Internal(format!("Join error: {e}")))?
    }
}

/// Creates the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::status))
        // Emotion and embedding
        .route("/emotion/classify", post(emotion::classify))
        .route("/emotion/categories", get(emotion::categories))
        .route("/embed/text", post(emotion::embed_text))
        // Catalog and index maintenance
        .route("/titles", post(titles::ingest))
        .route("/titles/:id", delete(titles::remove))
        .route("/index/rebuild", post(titles::rebuild))
        .route("/index/persist", post(titles::persist))
        .route("/index/stats", get(titles::stats))
        .route("/index/search-effort", post(titles::set_search_effort))
        // Users
        .route("/users/:id/recommend", post(users::recommend))
        .route("/users/:id/feedback", post(users::feedback))
        .route("/users/:id/profile", get(users::profile))
        .route("/users/:id/profile/recompute", post(users::recompute));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
