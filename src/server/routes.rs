//! Health and status handlers.

use axum::extract::State;

use crate::engine::EngineStatus;
use crate::types::{HealthResponse, HealthStatus};

use super::extractors::MsgPack;
use super::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check endpoint
///
/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> MsgPack<HealthResponse> {
    let status = state.engine.status();

    // Degraded when some catalog titles are not retrievable
    let health = if status.index.entries == status.titles {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    MsgPack(HealthResponse {
        status: health,
        version: VERSION.to_string(),
        titles: status.titles,
        index_entries: status.index.entries,
        classifier: status.classifier,
        embedder: status.embedder,
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET /api/v1/status
pub async fn status(State(state): State<AppState>) -> MsgPack<EngineStatus> {
    MsgPack(state.engine.status())
}
