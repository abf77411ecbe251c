use std::fmt::Write;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    state::{
        game::StatusSnapshot,
        state_machine::{RoundResult, StopReason},
    },
};

/// Publicly visible reason a session ended.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleStopReason {
    /// Too many missed rounds.
    MissLimit,
    /// Final level reached.
    LevelLimit,
    /// The server shut down.
    Shutdown,
}

impl From<StopReason> for VisibleStopReason {
    fn from(value: StopReason) -> Self {
        match value {
            StopReason::MissLimit => VisibleStopReason::MissLimit,
            StopReason::LevelLimit => VisibleStopReason::LevelLimit,
            StopReason::Shutdown => VisibleStopReason::Shutdown,
        }
    }
}

/// Publicly visible score of one round.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleRoundResult {
    /// Cleared in time without stray keys.
    Hit,
    /// Left lit, or stray key pressed.
    Miss,
}

impl From<RoundResult> for VisibleRoundResult {
    fn from(value: RoundResult) -> Self {
        match value {
            RoundResult::Hit => VisibleRoundResult::Hit,
            RoundResult::Miss => VisibleRoundResult::Miss,
        }
    }
}

/// Session status returned by `GET /session/status`.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// Whether a session is active.
    pub running: bool,
    /// Current difficulty level.
    pub level: u32,
    /// Current round interval in milliseconds.
    pub interval_ms: u64,
    /// Rounds cleared in time.
    pub hits: u32,
    /// Rounds missed.
    pub misses: u32,
    /// Misses that end a session; present while stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miss_limit: Option<u32>,
    /// Why the last session ended, if one has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<VisibleStopReason>,
    /// Identifier of the current or last session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// RFC 3339 start time of the current or last session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

impl From<StatusSnapshot> for StatusResponse {
    fn from(value: StatusSnapshot) -> Self {
        Self {
            running: value.running,
            level: value.level,
            interval_ms: value.interval.as_millis() as u64,
            hits: value.hits,
            misses: value.misses,
            miss_limit: (!value.running).then_some(value.miss_limit),
            stop_reason: value.stop_reason.map(Into::into),
            session_id: value.session_id,
            started_at: value.started_at.map(format_system_time),
        }
    }
}

/// Reply to `POST /session/start`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartResponse {
    /// `false` when a session was already running and nothing changed.
    pub started: bool,
    /// Status right after the request.
    pub status: StatusResponse,
}

/// Render the plain-text status page.
pub fn render_status_text(status: &StatusResponse) -> String {
    let mut out = String::new();
    if status.running {
        out.push_str(">>>> RUNNING >>>>\n");
    } else {
        out.push_str("**** STOPPED ****\n");
        out.push_str("To start: curl -X POST http://<host>/session/start\n");
        if let Some(limit) = status.miss_limit {
            let _ = writeln!(out, "Game over when misses >= {limit}");
        }
    }
    let _ = write!(
        out,
        "\nGame stats:\nLevel: {} (step time = {} ms)\nHits: {}, Misses: {}\n",
        status.level, status.interval_ms, status.hits, status.misses
    );
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn snapshot(running: bool) -> StatusSnapshot {
        StatusSnapshot {
            running,
            level: 2,
            interval: Duration::from_millis(1_600),
            hits: 23,
            misses: 4,
            miss_limit: 10,
            stop_reason: None,
            session_id: None,
            started_at: None,
        }
    }

    #[test]
    fn miss_limit_is_only_reported_while_stopped() {
        assert_eq!(StatusResponse::from(snapshot(true)).miss_limit, None);
        assert_eq!(StatusResponse::from(snapshot(false)).miss_limit, Some(10));
    }

    #[test]
    fn running_text_has_banner_and_stats() {
        let text = render_status_text(&snapshot(true).into());
        assert_eq!(
            text,
            ">>>> RUNNING >>>>\n\nGame stats:\nLevel: 2 (step time = 1600 ms)\nHits: 23, Misses: 4\n"
        );
    }

    #[test]
    fn stopped_text_explains_how_to_start() {
        let text = render_status_text(&snapshot(false).into());
        assert!(text.starts_with("**** STOPPED ****\n"));
        assert!(text.contains("Game over when misses >= 10\n"));
        assert!(text.ends_with("Hits: 23, Misses: 4\n"));
    }
}
