//! HTTP server setup and lifecycle.
//!
//! Configures the axum router with:
//! - The sleep, chain and health handlers
//! - `/metrics`, served when the telemetry backend is pull-based
//! - One tracing middleware creating the root span of every request
//! - Graceful shutdown support

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{any, get};
use axum::Router;
use opentelemetry::propagation::TextMapPropagator;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::field::Empty;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::Config;
use crate::observability::prometheus::metrics_handler;
use crate::observability::propagation::extract_context;
use crate::service::chain::handle_chain;
use crate::service::health::handle_health;
use crate::service::sleep::handle_sleep;
use crate::service::AppState;

/// Errors that end the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Root span for an inbound request, parented on any upstream trace.
fn server_span(propagator: &dyn TextMapPropagator, request: &Request<Body>) -> Span {
    let span = tracing::info_span!(
        "server",
        otel.kind = "server",
        http.request.method = %request.method(),
        url.path = %request.uri().path(),
        http.response.status_code = Empty,
    );
    span.set_parent(extract_context(propagator, request.headers()));
    span
}

/// Build the route table wrapped in the tracing middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let propagator = state.telemetry.propagator();

    // /metrics answers 404 unless the backend is pull-based
    let routes = Router::new()
        .route("/", any(handle_health))
        .route("/api/v1/sleep", get(handle_sleep))
        .route("/api/v1/chain", get(handle_chain))
        .route("/metrics", get(metrics_handler));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(move |request: &Request<Body>| server_span(propagator.as_ref(), request))
        .on_request(|_request: &Request<Body>, _span: &Span| {
            tracing::debug!(event = "read", "Request read");
        })
        .on_response(|response: &Response<Body>, latency: Duration, span: &Span| {
            span.record("http.response.status_code", response.status().as_u16());
            tracing::debug!(
                event = "write",
                latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                "Response written"
            );
        });

    routes.layer(trace_layer).with_state(state)
}

/// Bind the listener for `config`'s port.
pub async fn bind(config: &Config) -> Result<TcpListener, ServerError> {
    let address = config.bind_address();
    TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind { address, source })
}

/// Run the Sleepwalk HTTP server.
///
/// # Arguments
///
/// * `listener` - Bound listener to accept connections on
/// * `state` - Handler state
/// * `shutdown_rx` - Receiver for shutdown signal
///
/// # Returns
///
/// Returns when the server has shut down.
pub async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // Wait for shutdown signal
            let _ = shutdown_rx.changed().await;
            tracing::info!("Shutdown signal received, stopping server");
        })
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("Server stopped");
    Ok(())
}
