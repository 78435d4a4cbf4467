//! Title ingestion and index maintenance handlers.

use axum::extract::{Path, State};
use tracing::info;

use crate::catalog::TitleRecord;
use crate::engine::{IngestReport, PersistReport, RebuildReport};
use crate::error::AppError;
use crate::index::IndexStats;
use crate::types::{DeleteTitleResponse, RebuildIndexRequest, SearchEffortRequest};

use super::extractors::{MsgPack, MsgPackExtractor};
use super::AppState;

/// POST /api/v1/titles
///
/// Embed a title and add it to the index. Embedding failures surface.
pub async fn ingest(
    State(state): State<AppState>,
    MsgPackExtractor(record): MsgPackExtractor<TitleRecord>,
) -> Result<MsgPack<IngestReport>, AppError> {
    let report = state
        .blocking(move |engine| Ok(engine.ingest_title(record)?))
        .await?;
    Ok(MsgPack(report))
}

/// DELETE /api/v1/titles/:id
pub async fn remove(
    State(state): State<AppState>,
    Path(title_id): Path<String>,
) -> Result<MsgPack<DeleteTitleResponse>, AppError> {
    let id = title_id.clone();
    let removed = state
        .blocking(move |engine| Ok(engine.remove_title(&id)?))
        .await?;
    if !removed {
        return Err(AppError::NotFound(format!("Title {title_id} not found")));
    }
    Ok(MsgPack(DeleteTitleResponse { title_id, removed }))
}

/// POST /api/v1/index/rebuild
///
/// Re-embeds the supplied titles, or re-indexes the stored catalog when the
/// body carries none.
pub async fn rebuild(
    State(state): State<AppState>,
    MsgPackExtractor(req): MsgPackExtractor<RebuildIndexRequest>,
) -> Result<MsgPack<RebuildReport>, AppError> {
    let report = state
        .blocking(move |engine| match req.titles {
            Some(titles) => Ok(engine.rebuild_index(titles)?),
            None => Ok(engine.rebuild_from_catalog()?),
        })
        .await?;
    Ok(MsgPack(report))
}

/// POST /api/v1/index/persist
pub async fn persist(State(state): State<AppState>) -> Result<MsgPack<PersistReport>, AppError> {
    let report = state.blocking(|engine| Ok(engine.persist()?)).await?;
    Ok(MsgPack(report))
}

/// GET /api/v1/index/stats
pub async fn stats(State(state): State<AppState>) -> MsgPack<IndexStats> {
    MsgPack(state.engine.index_stats())
}

/// POST /api/v1/index/search-effort
pub async fn set_search_effort(
    State(state): State<AppState>,
    MsgPackExtractor(req): MsgPackExtractor<SearchEffortRequest>,
) -> Result<MsgPack<IndexStats>, AppError> {
    if req.effort == 0 {
        return Err(AppError::BadRequest(
            "search effort must be at least 1".to_string(),
        ));
    }
    state.engine.set_search_effort(req.effort);
    info!(effort = req.effort, "Search effort changed");
    Ok(MsgPack(state.engine.index_stats()))
}
