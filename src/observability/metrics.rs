//! Request metrics.
//!
//! Key metrics:
//! - api_server/receive_counts: Counter for requests received by a handler
//! - api_server/request_latency: Histogram for downstream call latency (ms)
//! - api_server/request_counts: Counter for completed downstream calls
//!
//! Every sample carries `project_id` plus the `trace_id` and `span_id` of the
//! handler span that produced it.

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::time::Duration;

use crate::observability::tracing::SpanIds;

pub const RECEIVE_COUNTS: &str = "api_server/receive_counts";
pub const REQUEST_LATENCY: &str = "api_server/request_latency";
pub const REQUEST_COUNTS: &str = "api_server/request_counts";

/// Sleepwalk metrics registry.
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Requests received by the sleep and chain handlers.
    pub receive_count: Counter<u64>,
    /// Wall-clock duration of downstream calls in milliseconds.
    pub request_latency: Histogram<f64>,
    /// Downstream calls that returned a response.
    pub request_count: Counter<u64>,
    common_labels: Vec<KeyValue>,
}

impl Metrics {
    /// Create the instruments from a meter.
    pub fn new(meter: &Meter, project_id: &str) -> Self {
        Self {
            receive_count: meter
                .u64_counter(RECEIVE_COUNTS)
                .with_description("The number of receive processed")
                .init(),
            request_latency: meter
                .f64_histogram(REQUEST_LATENCY)
                .with_description("The latency of requests processed")
                .with_unit("ms")
                .init(),
            request_count: meter
                .u64_counter(REQUEST_COUNTS)
                .with_description("The number of requests processed")
                .init(),
            common_labels: vec![KeyValue::new("project_id", project_id.to_string())],
        }
    }

    /// Fixed labels followed by the span's identifiers.
    pub fn labels(&self, ids: &SpanIds) -> Vec<KeyValue> {
        let mut labels = self.common_labels.clone();
        labels.push(KeyValue::new("trace_id", ids.trace_id.clone()));
        labels.push(KeyValue::new("span_id", ids.span_id.clone()));
        labels
    }

    /// Record a request arriving at a handler.
    pub fn record_received(&self, ids: &SpanIds) {
        self.receive_count.add(1, &self.labels(ids));
    }

    /// Record a completed downstream call.
    pub fn record_outbound(&self, ids: &SpanIds, latency: Duration) {
        let labels = self.labels(ids);
        self.request_latency
            .record(latency.as_secs_f64() * 1000.0, &labels);
        self.request_count.add(1, &labels);
    }
}
