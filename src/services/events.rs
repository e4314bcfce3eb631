//! Push events fanned out to every connected client.
//!
//! Whatever the transport, clients converge on the same truth: a
//! mutation ends with a full snapshot pushed through the shared hub.

use tracing::warn;

use crate::{
    dto::{
        board::BoardSnapshot,
        chat::PadChatSnapshot,
        health::HealthResponse,
        push::ServerEvent,
        ws::{PresenceEntry, PresenceSnapshot},
    },
    state::{SharedState, clock::wall_now_ms, pad::PadId},
};

/// Full board snapshot, pushed after every board mutation.
pub const EVENT_BOARD: &str = "board";
/// One pad chat channel, pushed after activity in it.
pub const EVENT_CHAT: &str = "chat";
/// Connected-client roster, pushed when connections come and go.
pub const EVENT_PRESENCE: &str = "presence";
/// Archive health flips, pushed when chat writes start or stop failing.
pub const EVENT_HEALTH: &str = "health";

/// Sanitize the board and capture a snapshot of it.
///
/// Expired windows are repaired before the capture so a snapshot taken
/// long after the last mutation still reflects current truth.
pub async fn capture_board(state: &SharedState) -> BoardSnapshot {
    let wall = wall_now_ms();
    let mut store = state.store().write().await;
    store.board.sanitize(wall, state.config().report_window_ms);
    BoardSnapshot::capture(&store, wall)
}

/// Push the whole board to every subscriber.
pub async fn broadcast_board(state: &SharedState) {
    let snapshot = capture_board(state).await;
    send_event(state, EVENT_BOARD, &snapshot);
}

/// Push one pad chat channel to every subscriber.
pub async fn broadcast_chat_pad(state: &SharedState, pad_id: PadId) {
    let snapshot = {
        let chat = state.chat().read().await;
        PadChatSnapshot::capture(&chat, pad_id)
    };
    send_event(state, EVENT_CHAT, &snapshot);
}

/// Push the connected-client roster to every subscriber.
pub fn broadcast_presence(state: &SharedState) {
    send_event(state, EVENT_PRESENCE, &presence_snapshot(state));
}

/// Push the archive health flag to every subscriber.
pub fn broadcast_health(state: &SharedState, degraded: bool) {
    let clients = state.hub().receiver_count();
    let payload = if degraded {
        HealthResponse::degraded(clients)
    } else {
        HealthResponse::ok(clients)
    };
    send_event(state, EVENT_HEALTH, &payload);
}

/// Current connections, ordered by pad then name for stable display.
pub fn presence_snapshot(state: &SharedState) -> PresenceSnapshot {
    let mut clients: Vec<PresenceEntry> = state
        .clients()
        .iter()
        .map(|entry| PresenceEntry {
            role: entry.role,
            name: entry.name.clone(),
            pad_id: entry.pad_id,
            last_seen_ms: entry.last_seen_ms,
        })
        .collect();
    clients.sort_by(|a, b| a.pad_id.cmp(&b.pad_id).then_with(|| a.name.cmp(&b.name)));
    PresenceSnapshot { clients }
}

fn send_event<T>(state: &SharedState, event: &str, payload: &T)
where
    T: serde::Serialize,
{
    match ServerEvent::json(event, payload) {
        Ok(event) => state.hub().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize push payload"),
    }
}
