//! Mapping of component errors onto HTTP responses

use crate::command::ExecError;
use crate::credentials::CredentialError;
use crate::network::NetworkError;
use crate::update::UpdateError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use device_agent_shared::RequestParseError;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by the request handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// Payload could not be decoded or failed validation
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// A submission clashes with the device state
    #[error("{0}")]
    Conflict(&'static str),

    /// The agent itself failed (filesystem, process spawn)
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::BadRequest(msg) => {
                warn!(error = %msg, "rejected request");
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, *msg).into_response(),
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}

impl From<RequestParseError> for ApiError {
    fn from(err: RequestParseError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<NetworkError> for ApiError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::InvalidCredential(e) => ApiError::BadRequest(e.to_string()),
            other @ NetworkError::WriteProfile { .. } => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<UpdateError> for ApiError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::Upload(_) => ApiError::BadRequest(err.to_string()),
            UpdateError::Staging { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidKey => ApiError::BadRequest(err.to_string()),
            CredentialError::Io { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ExecError> for ApiError {
    fn from(err: ExecError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
