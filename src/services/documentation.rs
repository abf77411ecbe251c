use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for keydance.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::start_session,
        crate::routes::session::session_status,
        crate::routes::session::session_status_text,
        crate::routes::sse::session_stream,
        crate::routes::keypad::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::StatusResponse,
            crate::dto::session::StartResponse,
            crate::dto::sse::RoundEvent,
            crate::dto::sse::SessionStoppedEvent,
            crate::dto::keypad::KeypadInboundMessage,
            crate::dto::keypad::KeypadOutboundMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Start a session and read its status"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "keypads", description = "WebSocket operations for keypad devices"),
    )
)]
pub struct ApiDoc;
