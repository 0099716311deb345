use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrcError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GrcError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        GrcError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        GrcError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for GrcError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match &self {
            GrcError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone(), None)
            }
            GrcError::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_failed",
                message.clone(),
                Some(serde_json::json!({ "field": field })),
            ),
            GrcError::Unauthenticated(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", msg.clone(), None)
            }
            GrcError::NotFound { kind, id } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} {} not found", kind, id),
                None,
            ),
            GrcError::Crypto(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error", msg.clone(), None)
            }
            GrcError::Storage(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg.clone(), None)
            }
            GrcError::Report(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "report_error", msg.clone(), None)
            }
            GrcError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone(), None)
            }
        };

        let body = ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<redis::RedisError> for GrcError {
    fn from(err: redis::RedisError) -> Self {
        GrcError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for GrcError {
    fn from(err: serde_json::Error) -> Self {
        GrcError::Storage(format!("JSON error: {}", err))
    }
}

impl From<handlebars::RenderError> for GrcError {
    fn from(err: handlebars::RenderError) -> Self {
        GrcError::Report(err.to_string())
    }
}

impl From<handlebars::TemplateError> for GrcError {
    fn from(err: handlebars::TemplateError) -> Self {
        GrcError::Report(err.to_string())
    }
}
