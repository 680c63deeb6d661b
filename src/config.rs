//! Configuration parsing for the Sleepwalk service.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides, optionally seeded from a `.env` file
//! - Fail-soft defaults: unresolved text settings are empty strings

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an alternative env file.
pub const ENV_FILE_VAR: &str = "ENV_FILE";

/// Env file read when [`ENV_FILE_VAR`] is unset.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Which telemetry backend receives spans and metrics.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Push spans and metrics to an OTLP/gRPC collector.
    #[default]
    Otlp,
    /// Serve metrics for Prometheus scraping; spans go to OTLP when configured.
    Prometheus,
}

/// Output format of the diagnostic log on stderr.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Sleepwalk: an instrumented HTTP demo service.
#[derive(Parser, Debug, Clone)]
#[command(name = "sleepwalk")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Service name, used as the trace resource name and log component
    #[arg(long, env = "APP_NAME", default_value = "")]
    pub app_name: String,

    /// Port to listen on (empty binds an ephemeral port)
    #[arg(long, env = "APP_PORT", default_value = "")]
    pub app_port: String,

    /// Version reported by the sleep endpoint
    #[arg(long, env = "APP_VERSION", default_value = "")]
    pub app_version: String,

    /// Project identifier used in trace resource paths and metric labels
    #[arg(long, env = "PROJECT_ID", default_value = "")]
    pub project_id: String,

    /// Downstream URL called by the chain endpoint
    #[arg(long, env = "ENDPOINT", default_value = "")]
    pub endpoint: String,

    /// Telemetry collector address (host:port or URL)
    #[arg(long, env = "OTEL_AGENT_ENDPOINT", default_value = "")]
    pub otel_agent_endpoint: String,

    /// Telemetry backend
    #[arg(long, env = "TELEMETRY_BACKEND", value_enum, default_value_t = BackendKind::Otlp)]
    pub telemetry_backend: BackendKind,

    /// Simulated work per request, in milliseconds
    #[arg(long, env = "SLEEP_MS", default_value_t = 2000)]
    pub sleep_ms: u64,

    /// Deadline for the downstream call, in milliseconds (unset: none)
    #[arg(long, env = "OUTBOUND_TIMEOUT_MS")]
    pub outbound_timeout_ms: Option<u64>,

    /// Export interval of the OTLP metric reader, in milliseconds
    #[arg(long, env = "METRIC_INTERVAL_MS", default_value_t = 2000)]
    pub metric_interval_ms: u64,

    /// Upper bound for flushing telemetry on shutdown, in milliseconds
    #[arg(long, env = "SHUTDOWN_TIMEOUT_MS", default_value_t = 1000)]
    pub shutdown_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Diagnostic log format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        let port = self.app_port.trim();
        if port.is_empty() {
            "0.0.0.0:0".to_string()
        } else {
            format!("0.0.0.0:{port}")
        }
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis(self.sleep_ms)
    }

    pub fn outbound_timeout(&self) -> Option<Duration> {
        self.outbound_timeout_ms.map(Duration::from_millis)
    }

    pub fn metric_interval(&self) -> Duration {
        Duration::from_millis(self.metric_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            app_port: String::new(),
            app_version: String::new(),
            project_id: String::new(),
            endpoint: String::new(),
            otel_agent_endpoint: String::new(),
            telemetry_backend: BackendKind::Otlp,
            sleep_ms: 2000,
            outbound_timeout_ms: None,
            metric_interval_ms: 2000,
            shutdown_timeout_ms: 1000,
            log_level: "info".into(),
            log_format: LogFormat::Text,
        }
    }
}

/// Seed the process environment from an env file.
///
/// Reads `$ENV_FILE` when set, otherwise `.env` in the working directory.
/// Variables already present in the environment are left untouched.
///
/// # Returns
///
/// The path that was loaded, or the error explaining why nothing was.
pub fn load_env_file() -> Result<PathBuf, dotenvy::Error> {
    let path = std::env::var_os(ENV_FILE_VAR)
        .map_or_else(|| PathBuf::from(DEFAULT_ENV_FILE), PathBuf::from);
    dotenvy::from_path(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sleep_ms, 2000);
        assert_eq!(config.telemetry_backend, BackendKind::Otlp);
        assert!(config.outbound_timeout().is_none());
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_bind_address_with_port() {
        let config = Config {
            app_port: "8080".into(),
            ..Config::default()
        };
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_bind_address_empty_port_is_ephemeral() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:0");
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::try_parse_from([
            "sleepwalk",
            "--app-name",
            "sleeper",
            "--app-version",
            "1.2.3",
            "--telemetry-backend",
            "prometheus",
            "--outbound-timeout-ms",
            "250",
        ])
        .expect("flags should parse");

        assert_eq!(config.app_name, "sleeper");
        assert_eq!(config.app_version, "1.2.3");
        assert_eq!(config.telemetry_backend, BackendKind::Prometheus);
        assert_eq!(config.outbound_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = Config::try_parse_from(["sleepwalk", "--telemetry-backend", "zipkin"]);
        assert!(result.is_err());
    }

    // ENV_FILE is process-wide, so every case runs inside one test
    #[test]
    fn test_load_env_file() {
        let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
        writeln!(file, "SLEEPWALK_TEST_SEEDED=from-file").expect("failed to write env file");
        writeln!(file, "SLEEPWALK_TEST_PRESET=from-file").expect("failed to write env file");
        std::env::set_var("SLEEPWALK_TEST_PRESET", "from-env");

        std::env::set_var(ENV_FILE_VAR, file.path());
        let loaded = load_env_file().expect("env file should load");
        assert_eq!(loaded, file.path());
        assert_eq!(
            std::env::var("SLEEPWALK_TEST_SEEDED").as_deref(),
            Ok("from-file")
        );
        // Existing variables win over the file
        assert_eq!(
            std::env::var("SLEEPWALK_TEST_PRESET").as_deref(),
            Ok("from-env")
        );

        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::env::set_var(ENV_FILE_VAR, dir.path().join("absent.env"));
        assert!(load_env_file().is_err());

        std::env::remove_var(ENV_FILE_VAR);
    }
}
