//! Tracing decorator around `reqwest::Client`.

use opentelemetry::propagation::TextMapCompositePropagator;
use reqwest::{Request, Response};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tracing::field::Empty;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::observability::propagation::inject_context;

/// Errors from outbound calls.
///
/// Both variants render the full source chain so log entries carry the
/// underlying cause (e.g. `relative URL without a base`).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be constructed (bad URL, bad header).
    #[error("{}", error_chain(.0))]
    Build(#[source] reqwest::Error),
    /// The request was built but sending it failed (connect, timeout, I/O).
    #[error("{}", error_chain(.0))]
    Send(#[source] reqwest::Error),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Build(e) | Self::Send(e) => e.is_timeout(),
        }
    }
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// HTTP client that opens a span per call and injects propagation headers.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct TracedClient {
    inner: reqwest::Client,
    propagator: Arc<TextMapCompositePropagator>,
}

impl TracedClient {
    pub fn new(propagator: Arc<TextMapCompositePropagator>) -> Self {
        Self::with_client(reqwest::Client::new(), propagator)
    }

    pub fn with_client(inner: reqwest::Client, propagator: Arc<TextMapCompositePropagator>) -> Self {
        Self { inner, propagator }
    }

    /// Build a GET request for `url`, with an optional deadline.
    pub fn build_get(&self, url: &str, timeout: Option<Duration>) -> Result<Request, ClientError> {
        let mut builder = self.inner.get(url);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(ClientError::Build)
    }

    /// Send `request` inside a client span.
    ///
    /// The propagation headers are derived from the client span, so the
    /// downstream service sees it as its parent.
    pub async fn execute(&self, mut request: Request) -> Result<Response, ClientError> {
        let span = tracing::info_span!(
            "outbound_request",
            otel.name = %format!("HTTP {}", request.method()),
            otel.kind = "client",
            otel.status_code = Empty,
            http.request.method = %request.method(),
            url.full = %request.url(),
            http.response.status_code = Empty,
        );
        inject_context(self.propagator.as_ref(), &span.context(), request.headers_mut());

        async move {
            tracing::debug!(event = "write", "Sending request");
            match self.inner.execute(request).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    tracing::Span::current().record("http.response.status_code", status);
                    tracing::debug!(event = "read", status, "Response headers read");
                    Ok(response)
                }
                Err(e) => {
                    tracing::Span::current().record("otel.status_code", "ERROR");
                    tracing::debug!(error = %e, "Request failed");
                    Err(ClientError::Send(e))
                }
            }
        }
        .instrument(span)
        .await
    }
}
