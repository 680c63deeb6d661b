//! HTTP request handlers for Sleepwalk.
//!
//! - [`sleep::handle_sleep`]: simulated work, then a versioned greeting
//! - [`chain::handle_chain`]: simulated work, then one downstream call
//! - [`health::handle_health`]: static status body, not traced

pub mod chain;
pub mod health;
pub mod sleep;

use std::sync::Arc;

use crate::client::TracedClient;
use crate::config::Config;
use crate::observability::log_entry::{EntrySink, LogEntry, Severity, StdoutSink};
use crate::observability::telemetry::Telemetry;
use crate::observability::tracing::SpanIds;

/// State shared by every handler.
///
/// Nothing in here is mutated per request: instruments, the HTTP client and
/// the sink are all safe for concurrent use.
pub struct AppState {
    pub config: Config,
    pub telemetry: Arc<Telemetry>,
    pub client: TracedClient,
    pub sink: Arc<dyn EntrySink>,
}

impl AppState {
    /// Create handler state writing log entries to stdout.
    pub fn new(config: Config, telemetry: Arc<Telemetry>) -> Self {
        let client = TracedClient::new(telemetry.propagator());
        Self {
            config,
            telemetry,
            client,
            sink: Arc::new(StdoutSink),
        }
    }

    /// Replace the log entry destination.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EntrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Emit an entry for this service, correlated with `ids`.
    pub(crate) fn log(&self, severity: Severity, message: impl Into<String>, ids: &SpanIds) {
        let entry = LogEntry::new(severity, message)
            .with_component(&self.config.app_name)
            .with_span(&self.config.project_id, ids);
        self.sink.emit(&entry);
    }
}
