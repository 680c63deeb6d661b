//! Health handler.

use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

pub const HEALTH_BODY: &str = r#"{"status": "OK"}"#;

/// Handle any request to `/`. Not traced.
pub async fn handle_health() -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/json")], HEALTH_BODY)
}
