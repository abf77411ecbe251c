//! Wire-facing data transfer objects.

use std::time::SystemTime;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Health check payloads.
pub mod health;
/// Keypad WebSocket messages.
pub mod keypad;
/// Session status payloads.
pub mod session;
/// SSE payloads.
pub mod sse;
/// Validation helpers.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
