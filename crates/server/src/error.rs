// crates/server/src/error.rs
//! API error mapping.
//!
//! Handlers return [`ApiResult`]; every error variant knows its status code
//! and its client-safe message. Internal detail stays in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use agentdeck_core::DiscoveryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body sent with every non-2xx API response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Discovery(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client is told. Internal errors get a generic line; their
    /// detail is only logged.
    fn body(&self) -> ErrorBody {
        let (error, details) = match self {
            ApiError::SessionNotFound(id) => ("session not found", Some(id.clone())),
            ApiError::BadRequest(msg) => ("bad request", Some(msg.clone())),
            ApiError::Discovery(e) => ("transcript discovery failed", Some(e.to_string())),
            ApiError::Internal(_) => ("internal error", None),
        };
        ErrorBody {
            error: error.to_string(),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
