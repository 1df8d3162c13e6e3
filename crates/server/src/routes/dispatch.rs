use crate::error::{ServerError, ServerResult};
use crate::operation::Operation;
use crate::state::ServerState;
use crate::upload::read_upload;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Catch-all for every path without a dedicated route.
///
/// POST requests are validated as uploads first and only then matched
/// against the operation table, so a malformed upload to an unknown path
/// reports the upload problem. Other methods get 405.
pub async fn dispatch(
    State(state): State<Arc<ServerState>>,
    request: Request,
) -> ServerResult<Response> {
    if request.method() != Method::POST {
        return Err(ServerError::MethodNotAllowed);
    }

    let path = request.uri().path().to_string();
    let fields = read_upload(request, state.config.max_file_size()).await?;

    let operation = Operation::from_path(&path).ok_or(ServerError::NotFound)?;
    let handler = state.handlers.get(operation).ok_or(ServerError::NotFound)?;

    tracing::info!(
        operation = %operation,
        files = fields.files.len(),
        bytes = fields.files.iter().map(|f| f.len()).sum::<usize>(),
        "dispatching"
    );

    let output = handler.handle(operation, fields).await?;
    Ok(output.into_response())
}
