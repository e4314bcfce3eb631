/// Board mutations issued by operators and judges.
pub mod board_service;
/// Background chat archive writer with a coalescing window.
pub mod chat_saver;
/// Per-pad chat between the operator desk and judges.
pub mod chat_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Push events fanned out to connected clients.
pub mod events;
/// Health check service.
pub mod health_service;
/// Roster upload seeding the board.
pub mod roster_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// WebSocket connection and message handling service.
pub mod ws_service;
