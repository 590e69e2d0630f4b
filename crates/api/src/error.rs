//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, StoreError};
use saga::SagaError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Saga execution error.
    Saga(SagaError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::LoanNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        DomainError::InvalidOperation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Store(StoreError::RowMissing(_)) => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match &err {
        SagaError::BookNotFound(_) | SagaError::LoanNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        SagaError::BookNotAvailable(_) => (StatusCode::CONFLICT, err.to_string()),
        SagaError::InvalidOperation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        SagaError::Domain(inner) => {
            // Preserve the domain mapping for errors a saga merely relays.
            (domain_status(inner), err.to_string())
        }
        SagaError::CompensationFailed(_) | SagaError::Store(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::LoanNotFound(_) | DomainError::Store(StoreError::RowMissing(_)) => {
            StatusCode::NOT_FOUND
        }
        DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
        DomainError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}
