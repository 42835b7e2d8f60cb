//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A pipeline run was requested while one is already in flight
    #[error("analysis pipeline already running")]
    PipelineBusy,

    /// A stage could not read its input set at all
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    pub fn stage(stage: &'static str, source: sqlx::Error) -> Self {
        EngineError::StageFailed { stage, source }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            EngineError::PipelineBusy => {
                (StatusCode::CONFLICT, "Analysis pipeline already running".to_string())
            }
            EngineError::StageFailed { stage, source } => {
                tracing::error!("Stage {} failed: {}", stage, source);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{} stage failed", stage))
            }
            EngineError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
