//! Error types for the emma-server application.
//!
//! Defines [`ServerError`] as the primary error type for all operations
//! within `emma-server`. Only [`ServerError::Config`] is fatal; everything
//! else is absorbed at the request or background-task boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error type for emma-server operations.
///
/// # Examples
///
/// ```
/// use emma_server::error::ServerError;
///
/// let err = ServerError::Config("SLACK_BOT_TOKEN is not set".into());
/// assert!(err.to_string().contains("SLACK_BOT_TOKEN"));
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Missing or invalid configuration. Halts startup.
    #[error("Config error: {0}")]
    Config(String),

    /// Inbound request body is not valid JSON.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An error from a Slack Web API call.
    #[error("Slack API error: {0}")]
    SlackApi(String),

    /// An I/O error from file system or socket operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status used when this error reaches a response.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
