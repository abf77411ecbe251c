use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::session::{StatusResponse, VisibleRoundResult, VisibleStopReason};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `event:` name.
    pub event: Option<String>,
    /// SSE `data:` payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after every scored round that keeps the session going.
pub struct RoundEvent {
    /// Score of the elapsed round.
    pub result: VisibleRoundResult,
    /// Figures after scoring.
    pub status: StatusResponse,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a session ends.
pub struct SessionStoppedEvent {
    /// Why the session ended.
    pub reason: VisibleStopReason,
    /// Final figures.
    pub status: StatusResponse,
}
