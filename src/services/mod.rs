/// Admin login, dashboard and game-host actions.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Player login, answers and session teardown.
pub mod player_service;
/// Closes sessions idle past the configured timeout.
pub mod session_sweeper;
/// Per-session Server-Sent Events streams.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
