use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    dto::claim::RoleClaim,
    services::{events, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/board",
    responses((status = 200, description = "Realtime push stream", content_type = "text/event-stream", body = String))
)]
/// Stream realtime board, chat and presence events.
///
/// The subscription is primed with a fresh board push so a new display
/// converges without waiting for the next mutation.
pub async fn board_stream(
    State(state): State<SharedState>,
    claim: RoleClaim,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state);
    info!(role = ?claim.role, "new SSE connection");
    events::broadcast_board(&state).await;
    sse_service::to_sse_stream(receiver)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/board", get(board_stream))
}
