//! Telemetry context.
//!
//! [`Telemetry`] owns everything the rest of the process needs to emit
//! telemetry: the tracer and meter providers, the propagator and the metric
//! instruments. It is built once at startup and shared by `Arc`.

use opentelemetry::metrics::{MeterProvider as _, MetricsError};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::{TraceError, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use prometheus::Registry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

use crate::config::{BackendKind, Config};
use crate::observability::backend::{OtlpBackend, PrometheusBackend, TelemetryBackend};
use crate::observability::metrics::Metrics;
use crate::observability::propagation::composite_propagator;

/// Instrumentation scope for spans and metrics.
const SCOPE: &str = "sleepwalk";

/// Error type for telemetry initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("collector endpoint is not configured (set OTEL_AGENT_ENDPOINT)")]
    MissingEndpoint,
    #[error("Failed to initialize OpenTelemetry tracer: {0}")]
    TracerInit(#[from] TraceError),
    #[error("Failed to initialize metrics exporter: {0}")]
    MetricsInit(#[from] MetricsError),
    #[error("Failed to set global subscriber: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Builder for the telemetry context.
///
/// # Example
///
/// ```ignore
/// let telemetry = TelemetryBuilder::new(Box::new(PrometheusBackend::new(None)))
///     .service_name("sleeper")
///     .project_id("demo-project")
///     .build()?;
/// ```
pub struct TelemetryBuilder {
    backend: Box<dyn TelemetryBackend>,
    service_name: String,
    service_version: String,
    project_id: String,
    shutdown_timeout: Duration,
}

impl TelemetryBuilder {
    pub fn new(backend: Box<dyn TelemetryBackend>) -> Self {
        Self {
            backend,
            service_name: String::new(),
            service_version: String::new(),
            project_id: String::new(),
            shutdown_timeout: Duration::from_secs(1),
        }
    }

    /// Set the `service.name` resource attribute.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the `service.version` resource attribute.
    pub fn service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Set the project label attached to every metric sample.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    /// Bound the time spent flushing on shutdown.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Build the providers and instruments.
    ///
    /// Nothing is installed globally; see
    /// [`init_tracing`](crate::observability::tracing::init_tracing) for the
    /// subscriber.
    pub fn build(self) -> Result<Telemetry, TelemetryError> {
        let resource = build_resource(&self.service_name, &self.service_version);

        let tracer_provider = self.backend.tracer_provider(&resource)?;
        let meter_provider = self.backend.meter_provider(&resource)?;
        let metrics = Metrics::new(&meter_provider.meter(SCOPE), &self.project_id);

        Ok(Telemetry {
            tracer_provider,
            meter_provider,
            propagator: Arc::new(composite_propagator()),
            metrics,
            registry: self.backend.registry().cloned(),
            backend_name: self.backend.name(),
            shutdown_timeout: self.shutdown_timeout,
            shut_down: AtomicBool::new(false),
        })
    }
}

/// Resource descriptor shared by spans and metrics.
///
/// SDK defaults (`OTEL_RESOURCE_ATTRIBUTES`, `OTEL_SERVICE_NAME`, telemetry SDK
/// attributes) are merged with the service identity and host attributes.
fn build_resource(service_name: &str, service_version: &str) -> Resource {
    let mut attributes = vec![
        KeyValue::new("host.arch", std::env::consts::ARCH),
        KeyValue::new("os.type", std::env::consts::OS),
        KeyValue::new("process.pid", i64::from(std::process::id())),
    ];
    if !service_name.is_empty() {
        attributes.push(KeyValue::new("service.name", service_name.to_string()));
    }
    if !service_version.is_empty() {
        attributes.push(KeyValue::new("service.version", service_version.to_string()));
    }
    Resource::default().merge(&Resource::new(attributes))
}

/// Process-wide telemetry context.
pub struct Telemetry {
    tracer_provider: TracerProvider,
    meter_provider: SdkMeterProvider,
    propagator: Arc<TextMapCompositePropagator>,
    metrics: Metrics,
    registry: Option<Registry>,
    backend_name: &'static str,
    shutdown_timeout: Duration,
    shut_down: AtomicBool,
}

impl Telemetry {
    /// Build the context for the backend selected in `config`.
    pub fn from_config(config: &Config) -> Result<Self, TelemetryError> {
        let backend: Box<dyn TelemetryBackend> = match config.telemetry_backend {
            BackendKind::Otlp => Box::new(OtlpBackend::new(
                config.otel_agent_endpoint.clone(),
                config.metric_interval(),
            )),
            BackendKind::Prometheus => {
                let endpoint = Some(config.otel_agent_endpoint.trim())
                    .filter(|e| !e.is_empty())
                    .map(str::to_string);
                Box::new(PrometheusBackend::new(endpoint))
            }
        };

        TelemetryBuilder::new(backend)
            .service_name(config.app_name.clone())
            .service_version(config.app_version.clone())
            .project_id(config.project_id.clone())
            .shutdown_timeout(config.shutdown_timeout())
            .build()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn propagator(&self) -> Arc<TextMapCompositePropagator> {
        Arc::clone(&self.propagator)
    }

    /// Registry served at `/metrics`, when the backend is pull-based.
    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn tracer(&self) -> Tracer {
        self.tracer_provider.tracer(SCOPE)
    }

    /// A `tracing` layer exporting spans through this context's tracer.
    pub fn otel_layer<S>(&self) -> OpenTelemetryLayer<S, Tracer>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        tracing_opentelemetry::layer().with_tracer(self.tracer())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Flush and release the exporters.
    ///
    /// Only the first call does any work. Waits at most the configured
    /// shutdown timeout; an overrun is logged and the flush continues in the
    /// background.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let tracer_provider = self.tracer_provider.clone();
        let meter_provider = self.meter_provider.clone();
        let (done_tx, done_rx) = mpsc::channel();

        let spawned = std::thread::Builder::new()
            .name("telemetry-shutdown".into())
            .spawn(move || {
                if let Err(e) = tracer_provider.shutdown() {
                    tracing::error!(error = %e, "Failed to shutdown tracer provider");
                }
                // pushes any last exports to the receiver
                if let Err(e) = meter_provider.shutdown() {
                    tracing::error!(error = %e, "Failed to shutdown meter provider");
                }
                let _ = done_tx.send(());
            });

        if let Err(e) = spawned {
            tracing::error!(error = %e, "Failed to spawn telemetry shutdown thread");
            return;
        }

        match done_rx.recv_timeout(self.shutdown_timeout) {
            Ok(()) => tracing::debug!("Telemetry flushed"),
            Err(_) => tracing::warn!(
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Telemetry shutdown timed out"
            ),
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
