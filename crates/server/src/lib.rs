//! Filekit Server - HTTP gateway for file conversion operations
//!
//! The gateway sits in front of every `POST /<operation>` endpoint. It does
//! not know how to merge or convert anything itself; it guards the door and
//! hands validated uploads to a handler:
//!
//! - **Rate limiting**: fixed window per client key, checked before any body
//!   is read, with `Retry-After` on rejection
//! - **CORS**: origin allow-list applied to every response, preflight
//!   answered directly
//! - **Upload validation**: `multipart/form-data` only, each field streamed
//!   against a per-file ceiling (50 MB by default)
//! - **Dispatch**: a [`HandlerRegistry`] maps each [`Operation`] to an
//!   [`OperationHandler`]; the shipped document engine answers 501
//! - **Errors**: one JSON envelope, `{"ok": false, "error": "..."}`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness, never rate-limited
//! - `GET /metrics` - Prometheus metrics (when enabled)
//! - `POST /merge`, `/split`, `/compress`, `/pdf-to-word`, `/word-to-pdf`,
//!   `/jpg-to-pdf`, `/pdf-to-jpg`, `/rotate`, `/protect`, `/unlock`,
//!   `/text-to-pdf`, `/html-to-pdf` - multipart operations
//! - `OPTIONS *` - CORS preflight

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod operation;
pub mod routes;
pub mod server;
pub mod state;
pub mod upload;

pub use config::ServerConfig;
pub use error::{ErrorResponse, ServerError, ServerResult};
pub use handlers::{
    DocumentEngine, DocumentRequest, HandlerError, HandlerRegistry, OperationHandler,
    OperationOutput, UnconnectedEngine,
};
pub use operation::Operation;
pub use server::{build_router, start_server};
pub use state::{RateDecision, RateLimiter, ServerState};
pub use upload::{UploadFields, UploadedFile};
