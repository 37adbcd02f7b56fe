use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

/// Error type of every HTTP action. Renders as `{ "error": string }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Required fields absent from the request, all reported at once.
    #[error("Missing required fields: {}", .fields.join(", "))]
    Validation { fields: Vec<&'static str> },

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            AppError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Database(_)) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation { fields } => json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            AppError::Store(StoreError::Conflict { constraint }) => json!({
                "error": format!("Record already exists ({constraint})"),
            }),
            AppError::Store(StoreError::NotFound) => json!({ "error": "Record not found" }),
            AppError::Store(StoreError::Database(e)) => {
                error!(error = %e, "store failure");
                json!({ "error": "Something went wrong" })
            }
            AppError::Internal(e) => {
                error!(error = %e, "internal failure");
                json!({ "error": "Something went wrong" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
