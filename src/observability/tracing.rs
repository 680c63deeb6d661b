//! Tracing subscriber setup.
//!
//! Configures:
//! - Diagnostic logging on stderr (text or JSON), filtered by `RUST_LOG`
//! - The OpenTelemetry layer that turns this crate's spans into exported spans
//!
//! Stdout is left to the application log entries.

use opentelemetry::trace::TraceContextExt;
use tracing::Level;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{Config, LogFormat};
use crate::observability::telemetry::{Telemetry, TelemetryError};

/// Trace and span identifiers of a `tracing` span, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanIds {
    pub trace_id: String,
    pub span_id: String,
}

impl SpanIds {
    /// Read the OpenTelemetry identifiers assigned to `span`.
    ///
    /// Spans not seen by the OpenTelemetry layer yield all-zero ids.
    pub fn of(span: &tracing::Span) -> Self {
        let cx = span.context();
        let otel_span = cx.span();
        let span_context = otel_span.span_context();
        Self {
            trace_id: span_context.trace_id().to_string(),
            span_id: span_context.span_id().to_string(),
        }
    }
}

/// Targets forwarded to the OpenTelemetry layer.
///
/// Exporter internals (tonic, h2, hyper) are excluded so export calls do not
/// trace themselves.
pub fn otel_filter() -> Targets {
    Targets::new()
        .with_target("sleepwalk", Level::DEBUG)
        .with_target("tower_http", Level::DEBUG)
}

/// Install the global tracing subscriber.
///
/// This sets up:
/// - A fmt layer on stderr with the configured format and `log_level` filter
/// - The OpenTelemetry layer bound to `telemetry`'s tracer
///
/// # Errors
///
/// Fails if a global subscriber has already been installed.
pub fn init_tracing(config: &Config, telemetry: &Telemetry) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .with(telemetry.otel_layer().with_filter(otel_filter()))
        .try_init()?;

    tracing::info!(
        service = %config.app_name,
        backend = telemetry.backend_name(),
        "Tracing initialized"
    );
    Ok(())
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
