//! Structured log entries in the Cloud Logging JSON shape.
//!
//! One entry renders to one line of JSON:
//!
//! ```text
//! {"message":"Handling request","severity":"INFO",
//!  "logging.googleapis.com/trace":"projects/p/traces/4bf9...",
//!  "logging.googleapis.com/spanId":"00f0...","component":"sleeper"}
//! ```
//!
//! Entries are written through an [`EntrySink`] so the destination can be
//! swapped (stdout in the binary, memory in tests).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use crate::observability::tracing::SpanIds;

/// Log severity, as understood by Cloud Logging.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    #[default]
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

/// A single structured log entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(
        rename = "logging.googleapis.com/trace",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub trace: Option<String>,
    #[serde(
        rename = "logging.googleapis.com/spanId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            trace: None,
            span_id: None,
            component: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Attach the emitting component. Empty names are left out.
    #[must_use]
    pub fn with_component(mut self, component: &str) -> Self {
        self.component = (!component.is_empty()).then(|| component.to_string());
        self
    }

    /// Correlate the entry with a span.
    ///
    /// The trace is written as a resource path under `project_id`.
    #[must_use]
    pub fn with_span(mut self, project_id: &str, ids: &SpanIds) -> Self {
        self.trace = Some(trace_resource_path(project_id, &ids.trace_id));
        self.span_id = Some(ids.span_id.clone());
        self
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(line) => f.write_str(&line),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize log entry");
                Ok(())
            }
        }
    }
}

/// Format a trace id as `projects/{project_id}/traces/{trace_id}`.
pub fn trace_resource_path(project_id: &str, trace_id: &str) -> String {
    format!("projects/{project_id}/traces/{trace_id}")
}

/// Destination for application log entries.
pub trait EntrySink: Send + Sync {
    fn emit(&self, entry: &LogEntry);
}

/// Writes one entry per line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl EntrySink for StdoutSink {
    fn emit(&self, entry: &LogEntry) {
        let line = entry.to_string();
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}") {
            tracing::error!(error = %e, "Failed to write log entry");
        }
    }
}

/// Keeps entries in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries with the given severity.
    pub fn with_severity(&self, severity: Severity) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.severity == severity)
            .collect()
    }
}

impl EntrySink for MemorySink {
    fn emit(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}
