use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::TrackId;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The track store had no records to build a feature matrix from
    #[error("Track store is empty, cannot build feature matrix")]
    EmptyStore,

    /// A categorical value that was not seen when the matrix was built
    #[error("Unknown category {value:?} for column {column}")]
    UnknownCategory { column: String, value: String },

    #[error("Unknown track id: {0}")]
    UnknownTrackId(TrackId),

    #[error("Invalid k: {0}")]
    InvalidK(i64),

    /// A persisted matrix exists but could not be decoded or failed validation
    #[error("Feature matrix artifact is corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) | AppError::UnknownTrackId(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) | AppError::InvalidK(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownCategory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::EmptyStore => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Cache(_)
            | AppError::Io(_)
            | AppError::ArtifactCorrupt(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
