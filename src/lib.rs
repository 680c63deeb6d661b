//! Sleepwalk: an instrumented HTTP demo service.
//!
//! Every request produces an OpenTelemetry span, metric samples and a
//! trace-correlated JSON log entry. The chain endpoint calls a downstream
//! service so that a single trace spans several hops.
//!
//! # Architecture
//!
//! - **Explicit telemetry context**: providers, propagator and instruments live
//!   in one [`observability::telemetry::Telemetry`] value built at startup
//! - **Pluggable backends**: OTLP push or Prometheus pull, behind
//!   [`observability::backend::TelemetryBackend`]
//! - **Propagating client**: outbound calls carry W3C trace context
//!
//! # Modules
//!
//! - [`client`]: Traced outbound HTTP client
//! - [`config`]: CLI, environment and `.env` configuration
//! - [`observability`]: Telemetry bootstrap, metrics, log entries, propagation
//! - [`server`]: Route table, tracing middleware and serve loop
//! - [`service`]: Request handlers (sleep, chain, health)

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // client::ClientError is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod client;
pub mod config;
pub mod observability;
pub mod server;
pub mod service;

pub use config::Config;
pub use observability::telemetry::Telemetry;
pub use service::AppState;
