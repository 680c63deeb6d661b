//! Chain handler: simulated work, then one call to the downstream service.
//!
//! Request construction and request execution fail the same way: one ERROR
//! entry with the cause, then a 500 with an empty body. Latency and count are
//! only recorded once a response arrives.

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::field::Empty;
use tracing::Instrument;

use crate::observability::log_entry::Severity;
use crate::observability::tracing::SpanIds;
use crate::service::AppState;

pub const CHAIN_MESSAGE: &str = "Good Morning. 'I'm wake up and call other service.";

#[derive(Serialize)]
struct ChainResponse {
    message: &'static str,
}

/// Handle GET /api/v1/chain.
pub async fn handle_chain(State(state): State<Arc<AppState>>) -> Response {
    let span = tracing::info_span!("sleepAndCall", otel.status_code = Empty);
    let ids = SpanIds::of(&span);

    async move {
        state.telemetry.metrics().record_received(&ids);
        state.log(
            Severity::Info,
            "Handle request. This function will call other service",
            &ids,
        );

        tokio::time::sleep(state.config.sleep_duration()).await;

        let request = match state
            .client
            .build_get(&state.config.endpoint, state.config.outbound_timeout())
        {
            Ok(request) => request,
            Err(e) => {
                tracing::Span::current().record("otel.status_code", "ERROR");
                state.log(
                    Severity::Error,
                    format!("Failed create http request: {e}"),
                    &ids,
                );
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let start = Instant::now();
        let response = match state.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::Span::current().record("otel.status_code", "ERROR");
                tracing::debug!(timeout = e.is_timeout(), "Downstream call failed");
                state.log(Severity::Error, format!("Failed call request: {e}"), &ids);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        let latency = start.elapsed();
        // Body is discarded unread
        drop(response);

        state.telemetry.metrics().record_outbound(&ids, latency);
        tracing::debug!(
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "Downstream call completed"
        );

        (StatusCode::OK, Json(ChainResponse { message: CHAIN_MESSAGE })).into_response()
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use crate::observability::log_entry::Severity;
    use crate::server::router;
    use crate::service::test_support::{fast_config, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn call_chain(endpoint: &str) -> (StatusCode, Vec<u8>, Vec<crate::observability::log_entry::LogEntry>) {
        let config = crate::Config {
            endpoint: endpoint.to_string(),
            ..fast_config()
        };
        let (state, sink) = test_state(config);
        let response = router(state)
            .oneshot(Request::builder().uri("/api/v1/chain").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, body, sink.with_severity(Severity::Error))
    }

    #[tokio::test]
    async fn test_malformed_endpoint_is_500() {
        let (status, body, errors) = call_chain("::not-a-url::").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Failed create http request: "));
    }

    #[tokio::test]
    async fn test_empty_endpoint_is_500() {
        let (status, body, errors) = call_chain("").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_500() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (status, body, errors) = call_chain(&format!("http://{addr}/")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Failed call request: "));
        assert!(errors[0].message.len() > "Failed call request: ".len());
    }
}
