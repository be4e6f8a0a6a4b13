//! Error types for the KYC pipeline and its HTTP boundary.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KycError>;

/// Everything a stage operation can fail with.
///
/// Failures are scoped to one request; nothing here is retried internally.
#[derive(Debug, Error)]
pub enum KycError {
    /// No session with this id.
    #[error("Session not found")]
    SessionNotFound(String),

    /// Verify called before both embeddings exist.
    #[error("Missing embeddings")]
    MissingPrerequisite,

    /// Malformed image or payload bytes.
    #[error("could not decode image: {0}")]
    DecodeFailure(String),

    /// Request is well-formed JSON but semantically unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Embeddings of different length cannot be compared.
    #[error("embedding dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// Embedding, liveness or OCR backend failed.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// Social profile page could not be fetched.
    #[error("Failed to fetch profile")]
    ExternalFetchFailure(String),

    /// Request body above the configured limit.
    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    /// Boundary API key check failed.
    #[error("Missing API key")]
    Unauthorized,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl KycError {
    /// HTTP status code for this error.
    ///
    /// - SessionNotFound: 404
    /// - MissingPrerequisite, DecodeFailure, InvalidRequest, ExternalFetchFailure: 400
    /// - DimensionMismatch: 422
    /// - CollaboratorUnavailable: 503
    /// - PayloadTooLarge: 413
    /// - Unauthorized: 401
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::MissingPrerequisite
            | Self::DecodeFailure(_)
            | Self::InvalidRequest(_)
            | Self::ExternalFetchFailure(_) => StatusCode::BAD_REQUEST,
            Self::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// True for failures the caller caused.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<JsonRejection> for KycError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(rejection.body_text())
        } else {
            Self::InvalidRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for KycError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for KycError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        // Collaborator internals stay out of the response body
        let detail = match &self {
            Self::CollaboratorUnavailable(_) => "Service unavailable".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
