//! MessagePack request extraction and response encoding.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

/// Extractor for `MessagePack` request bodies.
///
/// Accepts `application/msgpack` and `application/x-msgpack`; a missing
/// content type is treated as MessagePack.
pub struct MsgPackExtractor<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for MsgPackExtractor<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !content_type.is_empty() && !content_type.contains("msgpack") {
            return Err(AppError::Serialization(format!(
                "Invalid content type: expected application/msgpack, got {content_type}"
            )));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {e}")))?;

        rmp_serde::from_slice(&bytes)
            .map(MsgPackExtractor)
            .map_err(|e| AppError::Serialization(format!("Failed to deserialize MessagePack: {e}")))
    }
}

/// `MessagePack` response wrapper
pub struct MsgPack<T>(pub T);

impl<T: Serialize> IntoResponse for MsgPack<T> {
    fn into_response(self) -> Response {
        match rmp_serde::to_vec_named(&self.0) {
            Ok(bytes) => (
                StatusCode::OK,
                [("content-type", "application/msgpack")],
                bytes,
            )
                .into_response(),
            Err(e) => AppError::Internal(format!("Failed to serialize response: {e}"))
                .into_response(),
        }
    }
}
