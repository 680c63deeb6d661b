//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - An explicit telemetry context with pluggable exporter backends
//! - Metric instruments shared by all handlers
//! - Trace-correlated JSON log entries on stdout
//! - W3C trace-context propagation helpers
//! - Prometheus exposition for the pull backend

pub mod backend;
pub mod log_entry;
pub mod metrics;
pub mod prometheus;
pub mod propagation;
pub mod telemetry;
pub mod tracing;
