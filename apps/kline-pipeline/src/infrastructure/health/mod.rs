//! Health Check and Metrics Endpoint
//!
//! HTTP routes mounted next to the WebSocket endpoints on each binary's port,
//! plus the shared serve loop for those routers.
//!
//! # Endpoints
//!
//! - `GET /health` - Static liveness body
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::metrics::get_metrics_handle;

/// Body returned by `GET /health`.
pub const HEALTH_BODY: &str = "Server is up and running!";

// =============================================================================
// Routes
// =============================================================================

/// Health and metrics routes, mergeable into any router state.
pub fn health_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, HEALTH_BODY)
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

// =============================================================================
// HTTP Server
// =============================================================================

/// Bind `0.0.0.0:port` and serve `app` until `cancel` fires.
///
/// # Errors
///
/// Returns [`ServeError`] if binding fails or the server stops with an error.
pub async fn serve(app: Router, port: u16, cancel: CancellationToken) -> Result<(), ServeError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServeError::BindFailed(port, e.to_string()))?;

    tracing::info!(port, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ServeError::ServerFailed(e.to_string()))?;

    tracing::info!(port, "HTTP server stopped");
    Ok(())
}

// =============================================================================
// Errors
// =============================================================================

/// Listening server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn health_returns_static_body() {
        let app: Router = health_routes();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], HEALTH_BODY.as_bytes());
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app: Router = health_routes();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn serve_error_display() {
        let err = ServeError::BindFailed(8080, "address in use".to_string());
        assert_eq!(err.to_string(), "failed to bind to port 8080: address in use");
    }
}
