//! HTTP error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::rooms::{GatewayError, StoreError};

/// HTTP API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Room unknown or key mismatch
    #[error("forbidden")]
    Forbidden,

    /// Invalid request body
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Room name already taken
    #[error("conflict: room '{0}' already exists")]
    Conflict(String),

    /// Store or other internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::AccessDenied | GatewayError::UnknownRoom(_) => Self::Forbidden,
            GatewayError::NotJoined(room) => Self::BadRequest(format!("not a member of '{room}'")),
            GatewayError::Invalid(reason) => Self::BadRequest(reason.to_string()),
            GatewayError::Store(StoreError::RoomExists(name)) => Self::Conflict(name),
            GatewayError::Store(e) => Self::Internal(e.to_string()),
            GatewayError::Hub(e) => Self::Internal(e.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub error: &'static str,
    /// Error message (human-readable)
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 403 goes out with an empty body
        if let Self::Forbidden = self {
            tracing::debug!(status = %status, "Room access denied");
            return status.into_response();
        }

        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error_code = body.error, error_message = %body.message, "API error");
        } else {
            tracing::warn!(error_code = body.error, error_message = %body.message, status = %status, "API error");
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_gateway_error_mapping() {
        assert_eq!(
            ApiError::from(GatewayError::AccessDenied).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(GatewayError::Store(StoreError::RoomExists("ops".into()))).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(GatewayError::Store(StoreError::Io(io::Error::other("disk full"))))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(GatewayError::UnknownRoom("ghost".into())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(GatewayError::Invalid("room name is empty")).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_forbidden_has_empty_body() {
        let response = ApiError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_has_json_body() {
        let response = ApiError::Conflict("ops".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "CONFLICT");
    }
}
