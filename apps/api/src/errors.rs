use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::export::ExportError;
use crate::illustration::ImageGenError;
use crate::storage::StorageError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Provider is rate/billing limited; a themed fallback was substituted.
    #[error("{message}")]
    ImageUnavailable {
        message: String,
        fallback_url: String,
    },

    #[error("Image generation error: {0}")]
    ImageGeneration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<ImageGenError> for AppError {
    fn from(err: ImageGenError) -> Self {
        match err {
            ImageGenError::FallbackUsed { ref url, .. } => AppError::ImageUnavailable {
                message: err.to_string(),
                fallback_url: url.clone(),
            },
            ImageGenError::Provider(e) => AppError::ImageGeneration(e.to_string()),
            ImageGenError::Storage(e) => e.into(),
            ImageGenError::Store(e) => e.into(),
        }
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Store(e) => e.into(),
            ExportError::Storage(e) => e.into(),
            ExportError::Render(msg) => AppError::Internal(anyhow::anyhow!("PDF render: {msg}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut extra = serde_json::Value::Null;
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::ImageUnavailable {
                message,
                fallback_url,
            } => {
                tracing::warn!("Image provider unavailable, fallback served: {message}");
                extra = json!({ "fallback_url": fallback_url });
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "IMAGE_UNAVAILABLE",
                    message.clone(),
                )
            }
            AppError::ImageGeneration(msg) => {
                tracing::error!("Image generation error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "IMAGE_GENERATION_ERROR",
                    "Image generation failed".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let (Some(obj), serde_json::Value::Object(more)) = (error.as_object_mut(), extra) {
            obj.extend(more);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
