//! Sleepwalk: an instrumented HTTP demo service.
//!
//! # Usage
//!
//! ```bash
//! sleepwalk --app-name sleeper --app-port 8080 --endpoint http://localhost:8081/api/v1/sleep
//! ```
//!
//! Environment variables can also be used, and are seeded from `.env`
//! (or `$ENV_FILE`) when present:
//! - `APP_NAME`, `APP_PORT`, `APP_VERSION`, `PROJECT_ID`
//! - `ENDPOINT`: Downstream URL for `/api/v1/chain`
//! - `OTEL_AGENT_ENDPOINT`: Telemetry collector address
//! - `TELEMETRY_BACKEND`: `otlp` or `prometheus`
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context as _;
use sleepwalk::config::{load_env_file, Config};
use sleepwalk::observability::log_entry::{EntrySink, LogEntry, StdoutSink};
use sleepwalk::observability::tracing::init_tracing;
use sleepwalk::server::{bind, run_server};
use sleepwalk::{AppState, Telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config, telemetry: &Telemetry, address: SocketAddr) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  Sleepwalk v{} - instrumented HTTP demo

  Configuration:
    Service:    {} {}
    Address:    {}
    Backend:    {}
    Collector:  {}
    Downstream: {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.app_name,
        config.app_version,
        address,
        telemetry.backend_name(),
        config.otel_agent_endpoint,
        config.endpoint,
    );
}

/// Resolve when SIGINT or SIGTERM arrives.
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {
                        tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating shutdown...");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            tracing::warn!(error = %e, "Failed to listen for ctrl+c");
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env_file();

    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();
    let sink = StdoutSink;

    let telemetry = match Telemetry::from_config(&config) {
        Ok(telemetry) => Arc::new(telemetry),
        Err(e) => {
            sink.emit(
                &LogEntry::error(format!("Failed to initialize telemetry: {e}"))
                    .with_component(&config.app_name),
            );
            return Err(e).context("telemetry initialization failed");
        }
    };

    init_tracing(&config, &telemetry)?;

    match env_file {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded env file"),
        Err(e) => tracing::info!("Not found .env file: {e}"),
    }

    let listener = match bind(&config).await {
        Ok(listener) => listener,
        Err(e) => {
            sink.emit(&LogEntry::error(e.to_string()).with_component(&config.app_name));
            telemetry.shutdown();
            return Err(e.into());
        }
    };
    let address = listener.local_addr()?;

    print_banner(&config, &telemetry, address);

    sink.emit(&LogEntry::info("Starting Http Server...").with_component(&config.app_name));

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let state = Arc::new(AppState::new(config, Arc::clone(&telemetry)));
    let served = run_server(listener, state, shutdown_rx).await;

    // Flush whatever is still buffered, even if serving failed
    telemetry.shutdown();
    served?;

    tracing::info!("Sleepwalk shutdown complete");
    Ok(())
}
