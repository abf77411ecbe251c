use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload including connected keypads.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let keypads = state.keypads().len();
    if keypads == 0 {
        debug!("no keypad connected");
    }
    HealthResponse::ok(keypads)
}
