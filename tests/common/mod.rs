//! Test utilities and server harness for Sleepwalk tests.
//!
//! Provides:
//! - In-process app server with an OpenTelemetry-aware subscriber
//! - A stub downstream service that records inbound headers
//! - Helpers for reading samples out of the Prometheus registry

#![allow(dead_code)]

use axum::http::{HeaderMap, StatusCode};
use axum::Router;
use prometheus::proto::MetricFamily;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::{Config as TraceConfig, TracerProvider};
use opentelemetry_sdk::Resource;
use sleepwalk::observability::backend::{PrometheusBackend, TelemetryBackend};
use sleepwalk::observability::log_entry::MemorySink;
use sleepwalk::observability::telemetry::{TelemetryBuilder, TelemetryError};
use sleepwalk::server::run_server;
use sleepwalk::{AppState, Config, Telemetry};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;

pub const PROJECT_ID: &str = "demo-project";

/// Configuration with a short simulated delay.
pub fn fast_config() -> Config {
    Config {
        app_name: "sleeper".into(),
        app_version: "1.2.3".into(),
        project_id: PROJECT_ID.into(),
        sleep_ms: 20,
        ..Config::default()
    }
}

/// An address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    listener.local_addr().expect("no local addr")
}

/// Sleepwalk running in-process on an ephemeral port.
///
/// Spans are recorded by an OpenTelemetry layer installed as the thread's
/// default subscriber, so tests must run on a current-thread runtime.
pub struct TestApp {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    pub telemetry: Arc<Telemetry>,
    pub http: reqwest::Client,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    _subscriber: tracing::subscriber::DefaultGuard,
}

/// Backend keeping finished spans in memory and metrics nowhere.
pub struct InMemoryBackend {
    exporter: InMemorySpanExporter,
}

impl InMemoryBackend {
    pub fn new(exporter: InMemorySpanExporter) -> Self {
        Self { exporter }
    }
}

impl TelemetryBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn tracer_provider(&self, resource: &Resource) -> Result<TracerProvider, TelemetryError> {
        Ok(TracerProvider::builder()
            .with_simple_exporter(self.exporter.clone())
            .with_config(TraceConfig::default().with_resource(resource.clone()))
            .build())
    }

    fn meter_provider(&self, resource: &Resource) -> Result<SdkMeterProvider, TelemetryError> {
        Ok(SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .build())
    }
}

impl TestApp {
    /// Start on the Prometheus backend.
    pub async fn start(config: Config) -> Self {
        Self::start_with(config, Box::new(PrometheusBackend::new(None))).await
    }

    pub async fn start_with(config: Config, backend: Box<dyn TelemetryBackend>) -> Self {
        let telemetry = TelemetryBuilder::new(backend)
            .service_name(config.app_name.clone())
            .project_id(config.project_id.clone())
            .build()
            .expect("telemetry should build");
        let telemetry = Arc::new(telemetry);

        let subscriber = tracing_subscriber::registry().with(telemetry.otel_layer());
        let guard = tracing::subscriber::set_default(subscriber);

        let sink = Arc::new(MemorySink::new());
        let state = AppState::new(config, Arc::clone(&telemetry)).with_sink(sink.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind app listener");
        let addr = listener.local_addr().expect("no local addr");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            run_server(listener, Arc::new(state), shutdown_rx)
                .await
                .expect("server failed");
        });

        Self {
            addr,
            sink,
            telemetry,
            http: reqwest::Client::new(),
            shutdown_tx,
            handle,
            _subscriber: guard,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(self.url(path))
            .send()
            .await
            .expect("request to app failed")
    }

    /// Gathered metric families from the app's registry.
    pub fn metric_families(&self) -> Vec<MetricFamily> {
        self.telemetry
            .registry()
            .expect("prometheus backend has a registry")
            .gather()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

/// Stub downstream service answering every request with a fixed status.
pub struct Downstream {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<HeaderMap>>>,
    handle: JoinHandle<()>,
}

impl Downstream {
    pub async fn start(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&received);

        let app = Router::new().fallback(move |headers: HeaderMap| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().expect("poisoned").push(headers);
                (status, "downstream body")
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind downstream listener");
        let addr = listener.local_addr().expect("no local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("downstream failed");
        });

        Self {
            addr,
            received,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/api/v1/sleep", self.addr)
    }

    /// Headers of every request received so far.
    pub fn received(&self) -> Vec<HeaderMap> {
        self.received.lock().expect("poisoned").clone()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

/// Find the metric family whose name contains `fragment`.
pub fn family<'a>(families: &'a [MetricFamily], fragment: &str) -> Option<&'a MetricFamily> {
    families.iter().find(|f| f.get_name().contains(fragment))
}

/// Sum of all counter samples in the family matching `fragment` (0 if absent).
pub fn counter_total(families: &[MetricFamily], fragment: &str) -> f64 {
    family(families, fragment).map_or(0.0, |f| {
        f.get_metric().iter().map(|m| m.get_counter().get_value()).sum()
    })
}

/// Number of observations in the histogram family matching `fragment` (0 if absent).
pub fn histogram_count(families: &[MetricFamily], fragment: &str) -> u64 {
    family(families, fragment).map_or(0, |f| {
        f.get_metric()
            .iter()
            .map(|m| m.get_histogram().get_sample_count())
            .sum()
    })
}

/// Value of label `name` on the first sample of the family matching `fragment`.
pub fn label_value(families: &[MetricFamily], fragment: &str, name: &str) -> Option<String> {
    let family = family(families, fragment)?;
    let metric = family.get_metric().first()?;
    metric
        .get_label()
        .iter()
        .find(|l| l.get_name() == name)
        .map(|l| l.get_value().to_string())
}

/// Split a `traceparent` header into `(trace_id, parent_span_id)`.
pub fn parse_traceparent(value: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = value.split('-').collect();
    match parts.as_slice() {
        [_, trace_id, span_id, _] => Some((trace_id.to_string(), span_id.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_traceparent() {
        let parsed = parse_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
        assert_eq!(
            parsed,
            Some((
                "4bf92f3577b34da6a3ce929d0e0e4736".to_string(),
                "00f067aa0ba902b7".to_string()
            ))
        );
        assert!(parse_traceparent("garbage").is_none());
    }
}
