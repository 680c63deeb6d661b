//! Outbound HTTP client.
//!
//! One [`TracedClient`] is shared by every handler. Each call it makes gets a
//! client span and carries the caller's trace context to the downstream
//! service.

mod traced;

pub use traced::{ClientError, TracedClient};
