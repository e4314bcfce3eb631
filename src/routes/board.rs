use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::{board::BoardSnapshot, chat::ChatOverview, claim::RoleClaim},
    services::{chat_service, events},
    state::SharedState,
};

/// Read endpoints for consoles that pull instead of subscribing.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/board", get(board_snapshot))
        .route("/chat", get(chat_overview))
}

#[utoipa::path(
    get,
    path = "/board",
    tag = "board",
    responses((status = 200, description = "Current sanitized board", body = BoardSnapshot))
)]
/// Return the full board as of this instant.
pub async fn board_snapshot(
    State(state): State<SharedState>,
    _claim: RoleClaim,
) -> Json<BoardSnapshot> {
    Json(events::capture_board(&state).await)
}

#[utoipa::path(
    get,
    path = "/chat",
    tag = "chat",
    responses((status = 200, description = "Retained chat channels", body = ChatOverview))
)]
/// Return every retained chat channel.
pub async fn chat_overview(
    State(state): State<SharedState>,
    _claim: RoleClaim,
) -> Json<ChatOverview> {
    Json(chat_service::overview(&state).await)
}
