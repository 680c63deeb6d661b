//! Sleep handler: simulated work, then a versioned greeting.

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

use crate::observability::log_entry::Severity;
use crate::observability::tracing::SpanIds;
use crate::service::AppState;

pub const SLEEP_MESSAGE: &str = "Good Morning. 'I'm wake up.";

#[derive(Serialize)]
struct SleepResponse<'a> {
    message: &'a str,
    version: &'a str,
}

/// Handle GET /api/v1/sleep.
///
/// Always answers 200; there is no failure path.
pub async fn handle_sleep(State(state): State<Arc<AppState>>) -> Response {
    let span = tracing::info_span!("sleep");
    let ids = SpanIds::of(&span);

    async move {
        state.telemetry.metrics().record_received(&ids);
        state.log(Severity::Info, "Handling request", &ids);

        tokio::time::sleep(state.config.sleep_duration()).await;

        let body = SleepResponse {
            message: SLEEP_MESSAGE,
            version: &state.config.app_version,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
    .instrument(span)
    .await
}
