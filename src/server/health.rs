//! Liveness endpoints.
//!
//! Both return 200 as long as the server is accepting connections.

use axum::http::StatusCode;

/// Root handler. Identifies the service.
pub async fn root_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "GitHub Maintenance Exporter")
}

/// Health check handler.
///
/// ```ignore
/// GET /health HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: text/plain
///
/// OK
/// ```
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
