use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        session::StatusResponse,
        sse::{RoundEvent, ServerEvent, SessionStoppedEvent},
    },
    state::SessionEvent,
};

const EVENT_STATUS: &str = "status";
const EVENT_SESSION_STARTED: &str = "session.started";
const EVENT_ROUND: &str = "round";
const EVENT_SESSION_STOPPED: &str = "session.stopped";

/// SSE event carrying a full status snapshot.
pub fn status_event(status: &StatusResponse) -> Option<ServerEvent> {
    encode(EVENT_STATUS, status)
}

/// Translate an engine notification into its SSE form.
pub fn session_event(event: &SessionEvent) -> Option<ServerEvent> {
    match event {
        SessionEvent::Started(snapshot) => {
            let status: StatusResponse = snapshot.clone().into();
            encode(EVENT_SESSION_STARTED, &status)
        }
        SessionEvent::Round { result, snapshot } => encode(
            EVENT_ROUND,
            &RoundEvent {
                result: (*result).into(),
                status: snapshot.clone().into(),
            },
        ),
        SessionEvent::Stopped { reason, snapshot } => encode(
            EVENT_SESSION_STOPPED,
            &SessionStoppedEvent {
                reason: (*reason).into(),
                status: snapshot.clone().into(),
            },
        ),
    }
}

fn encode<T: Serialize>(name: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(name.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to serialize SSE payload");
            None
        }
    }
}
