use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{dto::claim::RoleClaim, services::ws_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a client session.
///
/// The role claim is checked before the upgrade; connections without a
/// usable claim never reach the socket loop.
pub async fn ws_handler(
    State(state): State<SharedState>,
    claim: RoleClaim,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let shared_state = state.clone();
    ws.on_upgrade(move |socket| ws_service::handle_socket(shared_state, socket, claim))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
