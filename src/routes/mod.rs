//! HTTP route trees.

use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check.
pub mod health;
/// Keypad WebSocket upgrade.
pub mod keypad;
/// Session control.
pub mod session;
/// Server-sent events.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(session::router())
        .merge(sse::router())
        .merge(keypad::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
