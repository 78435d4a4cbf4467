//! Emotion classification and text embedding handlers.

use axum::extract::State;

use crate::emotion::DEFINITIONS;
use crate::error::AppError;
use crate::types::{
    ClassifyEmotionRequest, ClassifyEmotionResponse, EmbedTextRequest, EmbedTextResponse,
    EmotionCategoriesResponse, EmotionCategoryInfo,
};

use super::extractors::{MsgPack, MsgPackExtractor};
use super::AppState;

/// POST /api/v1/emotion/classify
pub async fn classify(
    State(state): State<AppState>,
    MsgPackExtractor(req): MsgPackExtractor<ClassifyEmotionRequest>,
) -> Result<MsgPack<ClassifyEmotionResponse>, AppError> {
    let emotion = state
        .blocking(move |engine| Ok(engine.classify_emotion(&req.text)?))
        .await?;
    Ok(MsgPack(emotion.into()))
}

/// GET /api/v1/emotion/categories
pub async fn categories(State(state): State<AppState>) -> MsgPack<EmotionCategoriesResponse> {
    let overrides = &state.engine.config().emotion.category_weights;
    let categories = DEFINITIONS
        .iter()
        .map(|d| EmotionCategoryInfo {
            id: d.emotion,
            name: d.name.to_string(),
            prompt: d.prompt.to_string(),
            default_weight: overrides
                .get(&d.emotion)
                .copied()
                .unwrap_or(d.default_weight),
            valence_hint: d.valence_hint,
            arousal_hint: d.arousal_hint,
        })
        .collect();

    MsgPack(EmotionCategoriesResponse { categories })
}

/// POST /api/v1/embed/text
pub async fn embed_text(
    State(state): State<AppState>,
    MsgPackExtractor(req): MsgPackExtractor<EmbedTextRequest>,
) -> Result<MsgPack<EmbedTextResponse>, AppError> {
    let (embedding, model_id) = state
        .blocking(move |engine| {
            let embedding = engine.embed_text(&req.text)?;
            Ok((embedding, engine.model_id().to_string()))
        })
        .await?;

    Ok(MsgPack(EmbedTextResponse {
        dimensions: embedding.len(),
        embedding,
        model_id,
    }))
}
