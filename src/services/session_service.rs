use tracing::{debug, info};

use crate::{
    dto::session::{StartResponse, StatusResponse, render_status_text},
    error::ServiceError,
    state::{BeginOutcome, SharedState},
};

/// Begin a new session, or report the running one unchanged.
pub async fn begin(state: &SharedState) -> Result<StartResponse, ServiceError> {
    match state.game().begin().await {
        BeginOutcome::Started {
            generation,
            snapshot,
        } => {
            // No await between the commit above and arming, so a dropped
            // request cannot leave a running session without a timer.
            let first_round = state.game().rules().interval(0);
            if !state.scheduler().arm(generation, first_round) {
                return Err(ServiceError::ShuttingDown);
            }
            Ok(StartResponse {
                started: true,
                status: snapshot.into(),
            })
        }
        BeginOutcome::AlreadyRunning(snapshot) => {
            debug!("start requested while a session is running");
            Ok(StartResponse {
                started: false,
                status: snapshot.into(),
            })
        }
        BeginOutcome::Closed => Err(ServiceError::ShuttingDown),
    }
}

/// Snapshot of the current session.
pub async fn status(state: &SharedState) -> StatusResponse {
    state.game().status().await.into()
}

/// Plain-text rendering of [`status`].
pub async fn status_text(state: &SharedState) -> String {
    render_status_text(&status(state).await)
}

/// Quiesce every execution context and leave the indicators dark.
///
/// Input is disabled before the session is stopped, the round timer is
/// confirmed stopped before the deferred worker is awaited, and the lights are
/// forced off last.
pub async fn shutdown(state: &SharedState) {
    info!("quiescing game engine");
    state.input().disable();
    state.game().close().await;
    state.scheduler().shutdown().await;
    state.input().shutdown().await;
    state.game().lights_off().await;
    info!("game engine stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::{AppConfig, GameRules, IndicatorSettings},
        dto::session::VisibleStopReason,
        services::keypad_service::run_self_test,
        state::{
            AppState,
            engine::testing::ScriptedPatterns,
            game::{KeyCode, Pattern},
        },
    };

    fn app(rules: GameRules, patterns: ScriptedPatterns) -> SharedState {
        AppState::with_patterns(
            AppConfig::new(rules, IndicatorSettings::default()),
            Box::new(patterns),
        )
    }

    #[tokio::test]
    async fn stopped_status_before_any_session() {
        let state = app(GameRules::default(), ScriptedPatterns::new(&[], 0));
        let status = status(&state).await;
        assert!(!status.running);
        assert_eq!(status.miss_limit, Some(10));
        assert_eq!(status.interval_ms, 2_000);
        assert_eq!(status.session_id, None);
        assert!(status_text(&state).await.starts_with("**** STOPPED ****"));
    }

    #[tokio::test]
    async fn begin_starts_once() {
        let state = app(GameRules::default(), ScriptedPatterns::new(&[], 0));

        let first = begin(&state).await.unwrap();
        assert!(first.started);
        assert!(first.status.running);
        assert_eq!((first.status.level, first.status.hits, first.status.misses), (0, 0, 0));
        assert!(state.scheduler().is_armed());

        let second = begin(&state).await.unwrap();
        assert!(!second.started);
        assert_eq!(second.status.session_id, first.status.session_id);
    }

    #[tokio::test]
    async fn cancelled_start_never_leaves_a_session_without_a_timer() {
        for yields in 0..8 {
            let state = app(GameRules::default(), ScriptedPatterns::new(&[], 0));
            let request = {
                let state = state.clone();
                tokio::spawn(async move { begin(&state).await })
            };
            for _ in 0..yields {
                tokio::task::yield_now().await;
            }
            request.abort();
            let _ = request.await;

            let running = status(&state).await.running;
            assert_eq!(running, state.scheduler().is_armed(), "after {yields} yields");

            let again = begin(&state).await.unwrap();
            assert!(again.status.running);
            assert!(state.scheduler().is_armed());
            assert_eq!(again.started, !running);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_through_keys_and_timer() {
        let rules = GameRules {
            miss_limit: 1,
            ..GameRules::default()
        };
        let state = app(rules, ScriptedPatterns::new(&[0b011], 0b000));
        begin(&state).await.unwrap();

        // First tick at 2 s lights Num Lock and Caps Lock.
        tokio::time::sleep(Duration::from_millis(2_001)).await;
        assert_eq!(status(&state).await.hits, 1);

        state.input().notify(KeyCode(0x02));
        tokio::time::sleep(Duration::from_millis(10)).await;
        state.input().notify(KeyCode(0x03));
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Second tick: everything cleared, another hit.
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        let status = status(&state).await;
        assert!(status.running);
        assert_eq!((status.hits, status.misses), (2, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_self_test_leaves_the_lights_off() {
        let state = app(GameRules::default(), ScriptedPatterns::new(&[], 0));
        let flashing = tokio::spawn(run_self_test(state.game().clone()));

        tokio::time::sleep(Duration::from_millis(250)).await;
        shutdown(&state).await;
        assert_eq!(state.indicators().last_pattern(), Pattern::OFF);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        flashing.await.unwrap();
        assert_eq!(state.indicators().last_pattern(), Pattern::OFF);
    }

    #[tokio::test]
    async fn shutdown_stops_the_session_and_refuses_new_ones() {
        let state = app(GameRules::default(), ScriptedPatterns::new(&[], 0b111));
        begin(&state).await.unwrap();

        shutdown(&state).await;

        let status = status(&state).await;
        assert!(!status.running);
        assert_eq!(status.stop_reason, Some(VisibleStopReason::Shutdown));
        assert!(!state.scheduler().is_armed());
        assert_eq!(begin(&state).await.unwrap_err(), ServiceError::ShuttingDown);
        assert_eq!(state.indicators().last_pattern(), Pattern::OFF);
    }
}
