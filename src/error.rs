use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to HTTP callers, all rendered as `{"error": {"message", "type"}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Simulated {
        status: StatusCode,
        message: &'static str,
    },
    #[error("Gateway timeout")]
    Timeout,
    #[error("{message}")]
    InvalidRequest { status: StatusCode, message: String },
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Simulated { status, .. } => *status,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::InvalidRequest { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Simulated { .. } | ApiError::Internal(_) => "server_error",
            ApiError::Timeout => "timeout",
            ApiError::InvalidRequest { .. } => "invalid_request_error",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidRequest {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}
