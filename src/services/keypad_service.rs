use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    device::keypad::{KEYPAD_QUEUE_CAPACITY, KeypadConnection},
    dto::keypad::{InboundError, KeypadInboundMessage, KeypadOutboundMessage},
    services::input_service::Notification,
    state::{
        SharedGame, SharedState,
        game::{KeyCode, Pattern},
    },
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);
/// Half-period of the connection self-test flash.
const SELF_TEST_STEP: Duration = Duration::from_millis(200);
/// Number of on/off steps in the self-test; even so it ends dark.
const SELF_TEST_STEPS: usize = 6;

/// Internal error type for keypad frame handling.
#[derive(Debug, Error)]
enum KeypadError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// Frame could not be parsed or validated.
    #[error(transparent)]
    Inbound(#[from] InboundError),
    /// Identification sent again on an identified connection.
    #[error("duplicate identification from `{0}`")]
    DuplicateIdentification(String),
}

/// Handle the full lifecycle for an individual keypad WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (sender, mut receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(KEYPAD_QUEUE_CAPACITY);
    let (indicators_tx, indicators_rx) = watch::channel(Pattern::OFF);

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(run_writer(sender, outbound_rx, indicators_rx));

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.try_send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("keypad identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let keypad_id = match KeypadInboundMessage::from_json_str(&initial_message) {
        Ok(KeypadInboundMessage::Identification { id }) => id,
        Ok(_) => {
            warn!("first message was not identification");
            let _ = outbound_tx.try_send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse or validate keypad message");
            let _ = outbound_tx.try_send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    register(
        &state,
        KeypadConnection {
            id: keypad_id.clone(),
            tx: outbound_tx.clone(),
            indicators: indicators_tx,
        },
    )
    .await;
    info!(id = %keypad_id, "keypad connected");

    if state.config().indicators().self_test && !state.game().is_running() {
        tokio::spawn(run_self_test(state.game().clone()));
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match handle_frame(&state, &keypad_id, &text) {
                Ok(()) => {}
                Err(KeypadError::ConnectionClosed) => {
                    info!(id = %keypad_id, "connection closed during frame handling, terminating");
                    break;
                }
                Err(err) => warn!(id = %keypad_id, error = %err, "ignoring keypad frame"),
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.try_send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(id = %keypad_id, "keypad closed");
                let _ = outbound_tx.try_send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(id = %keypad_id, error = %err, "websocket error");
                break;
            }
        }
    }

    unregister(&state, &keypad_id, &outbound_tx);
    info!(id = %keypad_id, "keypad disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Add a keypad to the registry showing the current pattern.
///
/// Runs under the engine lock so no `set_pattern` can slip between reading
/// the current pattern and registering the keypad.
async fn register(state: &SharedState, connection: KeypadConnection) {
    state
        .game()
        .with_state(|_| {
            connection
                .indicators
                .send_replace(state.indicators().last_pattern());
            if let Some(previous) = state.keypads().insert(connection.id.clone(), connection) {
                info!(id = %previous.id, "keypad reconnected; replacing previous connection");
            }
        })
        .await;
}

/// Forward control frames and the latest indicator pattern to the socket.
async fn run_writer(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Message>,
    mut indicators_rx: watch::Receiver<Pattern>,
) {
    let mut indicators_open = true;
    loop {
        tokio::select! {
            message = outbound_rx.recv() => {
                let Some(message) = message else {
                    break;
                };
                if sender.send(message).await.is_err() {
                    break;
                }
            }
            changed = indicators_rx.changed(), if indicators_open => {
                if changed.is_err() {
                    indicators_open = false;
                    continue;
                }
                let pattern = *indicators_rx.borrow_and_update();
                let Some(frame) = indicator_frame(pattern) else {
                    continue;
                };
                if sender.send(frame).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Serialize `pattern` into an outbound text frame.
fn indicator_frame(pattern: Pattern) -> Option<Message> {
    match serde_json::to_string(&KeypadOutboundMessage::from(pattern)) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize indicator pattern");
            None
        }
    }
}

/// Route one text frame from an identified keypad.
fn handle_frame(state: &SharedState, keypad_id: &str, text: &str) -> Result<(), KeypadError> {
    match KeypadInboundMessage::from_json_str(text)? {
        KeypadInboundMessage::Key { scancode } => {
            let notification = state.input().notify(KeyCode(scancode));
            if notification != Notification::Deferred {
                debug!(id = %keypad_id, scancode, ?notification, "key not deferred");
            }
            if !state.keypads().contains_key(keypad_id) {
                // The indicator driver drops keypads whose writer has gone away.
                return Err(KeypadError::ConnectionClosed);
            }
            Ok(())
        }
        KeypadInboundMessage::Identification { id } => {
            Err(KeypadError::DuplicateIdentification(id))
        }
    }
}

/// Remove `keypad_id` unless a newer connection already took its place.
fn unregister(state: &SharedState, keypad_id: &str, tx: &mpsc::Sender<Message>) {
    state
        .keypads()
        .remove_if(keypad_id, |_, connection| connection.tx.same_channel(tx));
}

/// Flash every indicator a few times while no session runs.
///
/// Each step goes through the engine lock and stops as soon as a session starts.
pub async fn run_self_test(game: SharedGame) {
    for step in 0..SELF_TEST_STEPS {
        let pattern = if step % 2 == 0 { Pattern::ALL } else { Pattern::OFF };
        if !game.show_when_idle(pattern).await {
            debug!("self-test interrupted by a session");
            return;
        }
        sleep(SELF_TEST_STEP).await;
    }
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::Sender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AppConfig, GameRules},
        state::{
            AppState, BeginOutcome,
            engine::testing::{ScriptedPatterns, engine},
        },
    };

    #[tokio::test(start_paused = true)]
    async fn self_test_flashes_and_ends_dark() {
        let (game, indicators) = engine(GameRules::default(), ScriptedPatterns::new(&[], 0));
        run_self_test(game).await;
        assert_eq!(
            indicators.commands(),
            vec![
                Pattern::ALL,
                Pattern::OFF,
                Pattern::ALL,
                Pattern::OFF,
                Pattern::ALL,
                Pattern::OFF,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn self_test_yields_to_a_session() {
        let (game, indicators) = engine(GameRules::default(), ScriptedPatterns::new(&[], 0));
        let flashing = tokio::spawn(run_self_test(game.clone()));
        sleep(Duration::from_millis(300)).await;
        game.begin().await;
        flashing.await.unwrap();

        assert_eq!(
            indicators.commands(),
            vec![Pattern::ALL, Pattern::OFF, Pattern::OFF]
        );
    }

    #[test]
    fn indicator_frames_carry_the_pattern() {
        let Some(Message::Text(text)) = indicator_frame(Pattern::from_bits_truncate(0b101)) else {
            panic!("expected a text frame");
        };
        assert!(text.as_str().contains(r#""pattern":5"#), "{}", text.as_str());
    }

    #[tokio::test]
    async fn registration_replays_the_current_pattern_then_follows_updates() {
        let state = AppState::with_patterns(
            AppConfig::default(),
            Box::new(ScriptedPatterns::new(&[0b101, 0b010], 0)),
        );
        let BeginOutcome::Started { generation, .. } = state.game().begin().await else {
            panic!("session did not start");
        };
        state.game().tick(generation).await;

        let (tx, _control) = mpsc::channel(1);
        let (indicators, mut rx) = watch::channel(Pattern::OFF);
        register(
            &state,
            KeypadConnection {
                id: "desk".into(),
                tx,
                indicators,
            },
        )
        .await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Pattern::from_bits_truncate(0b101));

        state.game().tick(generation).await;
        assert_eq!(*rx.borrow_and_update(), Pattern::from_bits_truncate(0b010));
        assert!(state.keypads().contains_key("desk"));
    }
}
