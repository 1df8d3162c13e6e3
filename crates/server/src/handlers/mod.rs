//! Operation handlers and the dispatch table that binds them to paths.
//!
//! The gateway never knows what an operation does. It validates the upload,
//! looks the operation up in a [`HandlerRegistry`] and hands over the fields.

mod document;
mod pages;

pub use document::{
    CompressionLevel, DocumentEngine, DocumentHandler, DocumentRequest, Rotation,
    UnconnectedEngine,
};
pub use pages::{PageRange, PageSelection};

use async_trait::async_trait;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

use crate::operation::Operation;
use crate::upload::UploadFields;

/// Errors an operation handler can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("Missing required field \"{0}\"")]
    MissingField(&'static str),

    #[error("Invalid field \"{field}\": {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("{operation} is not implemented")]
    NotImplemented { operation: Operation },

    #[error("processing failed: {0}")]
    Failed(String),
}

impl HandlerError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        HandlerError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Binary result of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutput {
    pub bytes: Bytes,
    pub content_type: String,
    /// Suggested download name, sent as an attachment disposition.
    pub filename: Option<String>,
}

impl IntoResponse for OperationOutput {
    fn into_response(self) -> Response {
        let mut response = self.bytes.into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        let disposition = self
            .filename
            .map(|name| format!("attachment; filename=\"{}\"", name.replace('"', "")))
            .and_then(|v| HeaderValue::from_str(&v).ok());
        if let Some(value) = disposition {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        response
    }
}

/// A unit of work behind one `POST /<operation>` endpoint.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn handle(
        &self,
        operation: Operation,
        fields: UploadFields,
    ) -> Result<OperationOutput, HandlerError>;
}

/// Dispatch table from operation to handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Operation, Arc<dyn OperationHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation bound to a [`DocumentHandler`] over `engine`.
    pub fn with_document_engine(engine: Arc<dyn DocumentEngine>) -> Self {
        let handler: Arc<dyn OperationHandler> = Arc::new(DocumentHandler::new(engine));
        let mut registry = Self::new();
        for operation in Operation::ALL {
            registry.register(operation, handler.clone());
        }
        registry
    }

    /// Bind `handler` to `operation`, replacing any previous binding.
    pub fn register(&mut self, operation: Operation, handler: Arc<dyn OperationHandler>) {
        self.handlers.insert(operation, handler);
    }

    pub fn get(&self, operation: Operation) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(&operation).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ops: Vec<_> = self.handlers.keys().map(Operation::as_str).collect();
        ops.sort_unstable();
        f.debug_struct("HandlerRegistry").field("operations", &ops).finish()
    }
}

/// The shipped registry: every operation answers "not connected".
impl From<UnconnectedEngine> for HandlerRegistry {
    fn from(engine: UnconnectedEngine) -> Self {
        Self::with_document_engine(Arc::new(engine))
    }
}
