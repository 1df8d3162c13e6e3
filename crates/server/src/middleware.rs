use crate::error::ServerError;
use crate::operation::Operation;
use crate::state::{RateDecision, ServerState};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;

const ALLOW_METHODS: &str = "POST, GET, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";
const MAX_AGE_SECS: &str = "86400";

/// Request ID carried in request extensions and echoed on the response.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Logging and request metrics middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let route = route_label(uri.path());
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    tracing::info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "Request started"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    metrics::counter!(
        "filekit_requests_total",
        "operation" => route,
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}

/// Bounded label for request metrics: known routes by name, the rest pooled.
fn route_label(path: &str) -> &'static str {
    match path {
        "/health" => "health",
        "/metrics" => "metrics",
        other => Operation::from_path(other)
            .map(|op| op.as_str())
            .unwrap_or("unmatched"),
    }
}

/// CORS middleware.
///
/// Preflight requests are answered here with 204 and never reach the rate
/// limiter. Every other response gets the same headers attached. Unlisted
/// origins receive the first allowed origin, which the browser then rejects.
pub async fn cors(State(state): State<Arc<ServerState>>, request: Request, next: Next) -> Response {
    let origin = allowed_origin(&state.config.allowed_origins, request.headers());

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    if let Some(origin) = origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
    headers.insert(VARY, HeaderValue::from_static("Origin"));

    response
}

fn allowed_origin(allowed: &[String], headers: &HeaderMap) -> Option<HeaderValue> {
    let requested = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    let chosen = requested
        .filter(|origin| allowed.iter().any(|a| a == origin))
        .or_else(|| allowed.first().map(String::as_str))?;
    HeaderValue::from_str(chosen).ok()
}

/// Caps the time spent producing a response. An overrun answers 408 in the
/// error envelope and drops the in-flight handler future.
pub async fn timeout(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let limit = state.config.timeout();
    let uri = request.uri().clone();
    tokio::time::timeout(limit, next.run(request))
        .await
        .map_err(|_| {
            tracing::warn!(%uri, timeout_secs = limit.as_secs(), "request timed out");
            ServerError::Timeout
        })
}

/// Fixed-window rate limiting, applied before any body is read.
///
/// Health checks are exempt so probes keep working for throttled clients.
pub async fn rate_limit(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let method = request.method();
    let exempt = method == Method::OPTIONS
        || ((method == Method::GET || method == Method::HEAD)
            && request.uri().path() == "/health");
    if exempt {
        return Ok(next.run(request).await);
    }

    let key = client_key(&request, state.config.client_ip_header.as_deref());
    match state.rate_limiter.check(&key) {
        RateDecision::Limited { retry_after } => {
            metrics::counter!("filekit_rate_limited_total").increment(1);
            tracing::warn!(client = %key, retry_after_secs = retry_after.as_secs(), "rate limited");
            Err(ServerError::RateLimitExceeded {
                retry_after_secs: retry_after.as_secs_f64().ceil() as u64,
            })
        }
        RateDecision::Allowed { .. } | RateDecision::Untracked => Ok(next.run(request).await),
    }
}

/// Rate-limit key: trusted proxy header, then peer address, then `unknown`.
pub fn client_key(request: &Request, forwarded_header: Option<&str>) -> String {
    forwarded_header
        .and_then(|name| request.headers().get(name))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_allowed_origin_echoes_listed_origin() {
        let allowed = vec!["https://a.example".to_string(), "https://b.example".to_string()];
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("https://b.example"));
        assert_eq!(
            allowed_origin(&allowed, &headers).unwrap(),
            "https://b.example"
        );
    }

    #[test]
    fn test_allowed_origin_falls_back_to_first() {
        let allowed = vec!["https://a.example".to_string()];
        let mut headers = HeaderMap::new();
        assert_eq!(
            allowed_origin(&allowed, &headers).unwrap(),
            "https://a.example"
        );
        headers.insert(ORIGIN, HeaderValue::from_static("https://evil.example"));
        assert_eq!(
            allowed_origin(&allowed, &headers).unwrap(),
            "https://a.example"
        );
    }

    #[test]
    fn test_client_key_precedence() {
        let mut request = Request::builder()
            .uri("/merge")
            .header("cf-connecting-ip", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            client_key(&request, Some("cf-connecting-ip")),
            "203.0.113.7"
        );
        assert_eq!(client_key(&request, None), "unknown");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4242))));
        assert_eq!(client_key(&request, None), "10.0.0.9");
        assert_eq!(client_key(&request, Some("x-real-ip")), "10.0.0.9");
    }

    #[test]
    fn test_route_labels_are_bounded() {
        assert_eq!(route_label("/merge"), "merge");
        assert_eq!(route_label("/health"), "health");
        assert_eq!(route_label("/wp-admin/setup.php"), "unmatched");
    }
}
