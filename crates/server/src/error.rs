use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::handlers::HandlerError;

pub type ServerResult<T> = Result<T, ServerError>;

/// Every failure the gateway can report to a caller.
///
/// `Display` is the caller-facing message that ends up in the envelope.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("File \"{name}\" exceeds the {limit_mb} MB size limit")]
    FileTooLarge { name: String, limit_mb: usize },

    #[error("{0}")]
    InvalidField(String),

    #[error("Request body is too large")]
    PayloadTooLarge,

    #[error("Rate limit exceeded. Please wait before making more requests.")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Endpoint not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{message}")]
    NotImplemented { message: String, hint: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error envelope: `{"ok": false, "error": "...", "hint": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_)
            | ServerError::FileTooLarge { .. }
            | ServerError::InvalidField(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ServerError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a caller. Server-side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ServerError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn envelope(&self) -> ErrorResponse {
        let hint = match self {
            ServerError::NotImplemented { hint, .. } => Some(hint.clone()),
            _ => None,
        };
        ErrorResponse {
            ok: false,
            error: self.public_message(),
            hint,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(error = %self, "request failed");
        }

        let mut response = (status, Json(self.envelope())).into_response();

        if let ServerError::RateLimitExceeded { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs.max(1)));
        }

        response
    }
}

impl From<HandlerError> for ServerError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::MissingField(_) | HandlerError::InvalidField { .. } => {
                ServerError::InvalidField(err.to_string())
            }
            HandlerError::NotImplemented { operation } => ServerError::NotImplemented {
                message: format!("POST /{operation} processing logic is not connected"),
                hint: "Connect a document processing engine to implement this endpoint."
                    .to_string(),
            },
            HandlerError::Failed(detail) => ServerError::Internal(detail),
        }
    }
}
