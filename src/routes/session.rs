use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::session::{StartResponse, StatusResponse},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes exposing the session control plane.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session/start", post(start_session))
        .route("/session/status", get(session_status))
        .route("/session/status/text", get(session_status_text))
}

/// Begin a session; a no-op reported as success when one is already running.
#[utoipa::path(
    post,
    path = "/session/start",
    tag = "session",
    responses(
        (status = 200, description = "Session running", body = StartResponse),
        (status = 503, description = "Server is shutting down")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
) -> Result<Json<StartResponse>, AppError> {
    let response = session_service::begin(&state).await?;
    Ok(Json(response))
}

/// Current session status.
#[utoipa::path(
    get,
    path = "/session/status",
    tag = "session",
    responses((status = 200, description = "Session status", body = StatusResponse))
)]
pub async fn session_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(session_service::status(&state).await)
}

/// Current session status as plain text.
#[utoipa::path(
    get,
    path = "/session/status/text",
    tag = "session",
    responses((status = 200, description = "Session status", content_type = "text/plain", body = String))
)]
pub async fn session_status_text(State(state): State<SharedState>) -> String {
    session_service::status_text(&state).await
}
