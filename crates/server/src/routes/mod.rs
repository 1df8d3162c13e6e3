//! API route handlers
//!
//! - `health`: liveness and Prometheus metrics
//! - `dispatch`: `POST /<operation>` intake and handler invocation

pub mod dispatch;
pub mod health;

use crate::error::ServerError;

/// JSON 405 for routes that exist but not for the request method.
pub async fn method_not_allowed() -> ServerError {
    ServerError::MethodNotAllowed
}
