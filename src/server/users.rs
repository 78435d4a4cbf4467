//! Per-user recommendation and feedback handlers.

use axum::extract::{Path, Query, State};

use crate::error::AppError;
use crate::profile::ProfileSummary;
use crate::ranker::Recommendations;
use crate::types::{FeedbackRequest, ProfileQuery, ProfileResponse, RecommendRequest};

use super::extractors::{MsgPack, MsgPackExtractor};
use super::AppState;

/// POST /api/v1/users/:id/recommend
///
/// Ranking runs on the blocking pool under the configured deadline.
pub async fn recommend(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    MsgPackExtractor(req): MsgPackExtractor<RecommendRequest>,
) -> Result<MsgPack<Recommendations>, AppError> {
    let recommendations = state
        .engine
        .rank_with_timeout(req.into_rank_request(user_id))
        .await?;
    Ok(MsgPack(recommendations))
}

/// POST /api/v1/users/:id/feedback
pub async fn feedback(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    MsgPackExtractor(req): MsgPackExtractor<FeedbackRequest>,
) -> Result<MsgPack<ProfileSummary>, AppError> {
    let summary = state
        .blocking(move |engine| {
            Ok(engine.apply_feedback(&user_id, &req.title_id, req.action, req.strength)?)
        })
        .await?;
    Ok(MsgPack(summary))
}

/// GET /api/v1/users/:id/profile
///
/// `?include_vector=true` adds the preference vector.
pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> Result<MsgPack<ProfileResponse>, AppError> {
    let profile = state
        .blocking(move |engine| Ok(engine.profile(&user_id)?))
        .await?;

    Ok(MsgPack(ProfileResponse {
        profile: profile.summary(),
        preference: query.include_vector.then(|| profile.preference.clone()),
    }))
}

/// POST /api/v1/users/:id/profile/recompute
pub async fn recompute(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<MsgPack<ProfileSummary>, AppError> {
    let summary = state
        .blocking(move |engine| Ok(engine.recompute_profile(&user_id)?))
        .await?;
    Ok(MsgPack(summary))
}
