//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing X-API-Key header")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("API key is disabled")]
    ApiKeyDisabled,

    #[error("Unknown request user: {0}")]
    UnknownUser(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Storage error: {0}")]
    Storage(StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Rule violations and storage-level conflicts surface as domain errors;
/// only genuine storage failures stay `Storage`.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(domain) => AppError::Domain(domain),
            StoreError::Conflict(msg) => AppError::Domain(DomainError::Conflict(msg)),
            other => AppError::Storage(other),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 401 Unauthorized
            AppError::MissingApiKey => (StatusCode::UNAUTHORIZED, "missing_api_key", None),
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key", None),
            AppError::ApiKeyDisabled => (StatusCode::UNAUTHORIZED, "api_key_disabled", None),
            AppError::UnknownUser(id) => {
                (StatusCode::UNAUTHORIZED, "unknown_user", Some(id.clone()))
            }

            // 403 Forbidden
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => {
                let details = Some(domain_err.to_string());
                match domain_err {
                    DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", details),
                    DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", details),
                    DomainError::InvalidTransition { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", details)
                    }
                    DomainError::NotEligible(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "not_eligible", details)
                    }
                    DomainError::InvalidRating(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_rating", details)
                    }
                    DomainError::InvalidSession(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_session", details)
                    }
                    DomainError::InvalidRate(_) => (StatusCode::BAD_REQUEST, "invalid_rate", details),
                    DomainError::InvalidRequest(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_request", details)
                    }
                    DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict", details),
                }
            }

            // 5xx
            AppError::Storage(StoreError::Unavailable(msg)) => {
                tracing::error!("Storage unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", None)
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Gateway(e) => {
                tracing::error!("Payment gateway error: {}", e);
                (StatusCode::BAD_GATEWAY, "gateway_error", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.status_and_code();

        // Server-side failures keep their internals out of the response body
        let error = if status.is_server_error() && !matches!(self, AppError::Gateway(_)) {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
