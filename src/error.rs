use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::repository::StoreError;
use crate::service::recognition::RecognitionError;
use crate::service::WorkflowError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Plate recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Recognition(e) => AppError::Recognition(e),
            WorkflowError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Store(StoreError::NotFound(plate)) => {
                tracing::warn!("No open session for plate {}", plate);
                (StatusCode::NOT_FOUND, format!("No open session for plate {}", plate))
            }
            AppError::Store(e @ (StoreError::OpenSessionExists(_) | StoreError::SlotTaken(_))) => {
                tracing::warn!("Conflict: {}", e);
                (StatusCode::CONFLICT, e.to_string())
            }
            AppError::Store(e) => {
                tracing::error!("Session store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
            }
            AppError::Recognition(RecognitionError::NotConfigured) => {
                tracing::error!("Plate recognition is not configured");
                (StatusCode::SERVICE_UNAVAILABLE, "API key not configured".to_string())
            }
            AppError::Recognition(e) => {
                tracing::error!("Plate recognition error: {}", e);
                (StatusCode::BAD_GATEWAY, format!("Plate recognition failed: {}", e))
            }
            AppError::Validation(msg) => {
                tracing::warn!("Validation error: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, msg)
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Internal server error: {}", e))
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
