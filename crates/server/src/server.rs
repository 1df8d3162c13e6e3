//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration
//! - Middleware stack (CORS, rate limiting, logging, timeouts)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{cors, log_requests, rate_limit, request_id, timeout};
use crate::routes::{dispatch, health, method_not_allowed};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Build the Axum router with all routes and middleware
///
/// `/health` and `/metrics` have dedicated GET routes. Everything else falls
/// through to the operation dispatcher, which owns upload validation, the
/// 404 for unknown operations and the 405 for non-POST methods.
///
/// Middleware, outermost first:
/// 1. Tracing, request ID, request logging and metrics
/// 2. CORS (answers preflight requests itself)
/// 3. Rate limiting
/// 4. Timeout (408 in the error envelope)
/// 5. Body size limit
pub fn build_router(state: Arc<ServerState>) -> Router {
    let observability = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id))
        .layer(from_fn(log_requests));

    Router::new()
        .route(
            "/health",
            get(health::health_check).fallback(method_not_allowed),
        )
        .route(
            "/metrics",
            get(health::metrics).fallback(method_not_allowed),
        )
        .fallback(dispatch::dispatch)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(from_fn_with_state(state.clone(), timeout))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn_with_state(state.clone(), cors))
        .layer(observability)
        .with_state(state)
}

/// Start the filekit gateway
///
/// Initializes logging, spawns the rate-limit sweeper and serves until
/// SIGTERM or Ctrl+C.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(&config.log_level);

    let addr: SocketAddr = config.socket_addr()?;
    let state = Arc::new(ServerState::new(config.clone()));
    let sweeper = state.rate_limiter.clone().spawn_sweeper();
    let app = build_router(state.clone());

    tracing::info!(
        %addr,
        operations = state.handlers.len(),
        "Starting filekit gateway"
    );
    tracing::info!(
        timeout_secs = config.timeout_secs,
        max_file_size_mb = config.max_file_size_mb,
        max_body_size_mb = config.max_body_size_mb,
        "Limits"
    );
    tracing::info!(
        requests = config.rate_limit_per_minute,
        window_secs = config.rate_limit_window_secs,
        client_ip_header = config.client_ip_header.as_deref().unwrap_or("<peer>"),
        "Rate limit"
    );
    tracing::info!(
        origins = ?config.allowed_origins,
        metrics = state.metrics.is_some(),
        "CORS and metrics"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// JSON logs filtered by `RUST_LOG` when set, else by the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
