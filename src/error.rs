use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::emotion::ClassificationError;
use crate::engine::{EngineError, FeedbackError, IngestError, StorageError};
use crate::index::IndexError;
use crate::profile::ProfileStoreError;
use crate::ranker::RankError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    Feedback(#[from] FeedbackError),

    #[error(transparent)]
    Profile(#[from] ProfileStoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn embedding_status(e: &EmbeddingError) -> StatusCode {
    match e {
        EmbeddingError::EmptyInput => StatusCode::BAD_REQUEST,
        EmbeddingError::Degenerate => StatusCode::UNPROCESSABLE_ENTITY,
        EmbeddingError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EmbeddingError::InvalidDimension { .. } | EmbeddingError::Inference(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn index_status(e: &IndexError) -> StatusCode {
    match e {
        IndexError::InvalidDimension { .. } | IndexError::InvalidVector(_) => {
            StatusCode::BAD_REQUEST
        }
        IndexError::SnapshotMissing(_) => StatusCode::NOT_FOUND,
        IndexError::Corruption(_)
        | IndexError::Io(_)
        | IndexError::Operation(_)
        | IndexError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    /// Returns the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_)
            | Self::Engine(_)
            | Self::Profile(_)
            | Self::Storage(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Classification(e) => match e {
                ClassificationError::EmptyInput
                | ClassificationError::UnknownCategory(_)
                | ClassificationError::InvalidWeight { .. } => StatusCode::BAD_REQUEST,
                ClassificationError::Unintelligible => StatusCode::UNPROCESSABLE_ENTITY,
                ClassificationError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Embedding(e) => embedding_status(e),
            Self::Ingest(e) => match e {
                IngestError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
                IngestError::Embedding(e) => embedding_status(e),
                IngestError::Index(e) => index_status(e),
            },
            Self::Index(e) => index_status(e),
            Self::Rank(e) => match e {
                RankError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                RankError::RecommendationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                RankError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                RankError::Index(e) => index_status(e),
                RankError::Profile(_) | RankError::Aborted(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Feedback(e) => match e {
                FeedbackError::UnknownTitle(_) => StatusCode::NOT_FOUND,
                FeedbackError::InvalidStrength(_) | FeedbackError::InvalidRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                FeedbackError::Store(_) | FeedbackError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) | Self::Serialization(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Returns a machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Engine(_) => "ENGINE_ERROR",
            Self::Classification(_) => "CLASSIFICATION_ERROR",
            Self::Embedding(EmbeddingError::ModelUnavailable(_))
            | Self::Ingest(IngestError::Embedding(EmbeddingError::ModelUnavailable(_))) => {
                "MODEL_UNAVAILABLE"
            }
            Self::Embedding(_) | Self::Ingest(IngestError::Embedding(_)) => "EMBEDDING_ERROR",
            Self::Ingest(IngestError::InvalidRecord(_)) => "INVALID_TITLE",
            Self::Index(IndexError::Corruption(_))
            | Self::Ingest(IngestError::Index(IndexError::Corruption(_)))
            | Self::Rank(RankError::Index(IndexError::Corruption(_))) => "INDEX_CORRUPTION",
            Self::Index(IndexError::SnapshotMissing(_)) => "SNAPSHOT_MISSING",
            Self::Index(_) | Self::Ingest(IngestError::Index(_)) | Self::Rank(RankError::Index(_)) => {
                "INDEX_ERROR"
            }
            Self::Rank(RankError::InvalidRequest(_)) => "BAD_REQUEST",
            Self::Rank(RankError::RecommendationUnavailable(_)) => "RECOMMENDATION_UNAVAILABLE",
            Self::Rank(RankError::Timeout(_)) => "TIMEOUT",
            Self::Rank(_) => "RANKING_ERROR",
            Self::Feedback(FeedbackError::UnknownTitle(_)) => "UNKNOWN_TITLE",
            Self::Feedback(FeedbackError::InvalidStrength(_) | FeedbackError::InvalidRequest(_)) => {
                "BAD_REQUEST"
            }
            Self::Feedback(_) | Self::Profile(_) => "PROFILE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Error response body structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };

        // Try to serialize as msgpack, fall back to JSON
        if let Ok(bytes) = rmp_serde::to_vec_named(&body) {
            (status, [("content-type", "application/msgpack")], bytes).into_response()
        } else {
            let json = serde_json::to_string(&body).unwrap_or_else(|_| {
                r#"{"error":{"code":"SERIALIZATION_ERROR","message":"Failed to serialize error"}}"#.to_string()
            });
            (status, [("content-type", "application/json")], json).into_response()
        }
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
