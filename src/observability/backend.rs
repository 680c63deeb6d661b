//! Exporter backends.
//!
//! A backend decides where spans and metrics go. Two are provided:
//! - [`OtlpBackend`]: batch span export and periodic metric export over
//!   OTLP/gRPC to a collector
//! - [`PrometheusBackend`]: metrics collected into a [`Registry`] for scraping,
//!   spans over OTLP/gRPC when a collector is configured

use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Config as TraceConfig, Sampler, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use prometheus::Registry;
use std::time::Duration;

use crate::observability::telemetry::TelemetryError;

/// Strategy for constructing the tracer and meter providers.
pub trait TelemetryBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn tracer_provider(&self, resource: &Resource) -> Result<TracerProvider, TelemetryError>;

    fn meter_provider(&self, resource: &Resource) -> Result<SdkMeterProvider, TelemetryError>;

    /// Registry to expose at `/metrics`, for pull-based backends.
    fn registry(&self) -> Option<&Registry> {
        None
    }
}

/// Push spans and metrics to an OTLP/gRPC collector.
pub struct OtlpBackend {
    endpoint: String,
    metric_interval: Duration,
}

impl OtlpBackend {
    pub fn new(endpoint: impl Into<String>, metric_interval: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            metric_interval,
        }
    }
}

impl TelemetryBackend for OtlpBackend {
    fn name(&self) -> &'static str {
        "otlp"
    }

    fn tracer_provider(&self, resource: &Resource) -> Result<TracerProvider, TelemetryError> {
        otlp_tracer_provider(&self.endpoint, resource)
    }

    fn meter_provider(&self, resource: &Resource) -> Result<SdkMeterProvider, TelemetryError> {
        let url = collector_url(&self.endpoint).ok_or(TelemetryError::MissingEndpoint)?;
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(url);

        let provider = opentelemetry_otlp::new_pipeline()
            .metrics(runtime::Tokio)
            .with_exporter(exporter)
            .with_period(self.metric_interval)
            .with_resource(resource.clone())
            .build()?;

        tracing::info!(endpoint = %self.endpoint, "OTLP metrics exporter configured");
        Ok(provider)
    }
}

/// Serve metrics from a Prometheus registry.
pub struct PrometheusBackend {
    trace_endpoint: Option<String>,
    registry: Registry,
}

impl PrometheusBackend {
    /// `trace_endpoint` is the OTLP collector for spans; `None` keeps spans local.
    pub fn new(trace_endpoint: Option<String>) -> Self {
        Self {
            trace_endpoint,
            registry: Registry::new(),
        }
    }
}

impl TelemetryBackend for PrometheusBackend {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn tracer_provider(&self, resource: &Resource) -> Result<TracerProvider, TelemetryError> {
        match &self.trace_endpoint {
            Some(endpoint) => otlp_tracer_provider(endpoint, resource),
            None => {
                tracing::warn!("No collector configured, spans will not be exported");
                Ok(TracerProvider::builder()
                    .with_config(trace_config(resource))
                    .build())
            }
        }
    }

    fn meter_provider(&self, resource: &Resource) -> Result<SdkMeterProvider, TelemetryError> {
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(self.registry.clone())
            .build()?;

        Ok(SdkMeterProvider::builder()
            .with_reader(exporter)
            .with_resource(resource.clone())
            .build())
    }

    fn registry(&self) -> Option<&Registry> {
        Some(&self.registry)
    }
}

/// Always-on sampling with the service resource.
fn trace_config(resource: &Resource) -> TraceConfig {
    TraceConfig::default()
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource.clone())
}

fn otlp_tracer_provider(endpoint: &str, resource: &Resource) -> Result<TracerProvider, TelemetryError> {
    let url = collector_url(endpoint).ok_or(TelemetryError::MissingEndpoint)?;
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(url);

    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(trace_config(resource))
        .install_batch(runtime::Tokio)?;

    tracing::info!(endpoint, "OTLP span exporter configured");
    Ok(provider)
}

/// Normalize a collector address into a URL tonic can dial.
///
/// A bare `host:port` is dialled in plaintext over `http://`. Returns `None`
/// for an empty address.
pub fn collector_url(endpoint: &str) -> Option<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        None
    } else if endpoint.contains("://") {
        Some(endpoint.to_string())
    } else {
        Some(format!("http://{endpoint}"))
    }
}
