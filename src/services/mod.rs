//! Business logic behind the routes.

/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Two-phase raw key handling.
pub mod input_service;
/// Keypad WebSocket connection and message handling service.
pub mod keypad_service;
/// Re-arming round timer.
pub mod scheduler;
/// Session start, status and shutdown.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
