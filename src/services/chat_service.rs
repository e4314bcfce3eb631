//! Per-pad chat between the operator desk and pad judges.
//!
//! Chat rides the same command gate as the board so a message and the
//! push that carries it never interleave with a board mutation. Every
//! change also nudges the background archive saver.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::chat::ChatOverview,
    error::ServiceError,
    services::events,
    state::{
        SharedState,
        chat::ChatSender,
        clock::wall_now_ms,
        pad::PadId,
    },
};

/// Longest accepted chat message.
const MAX_MESSAGE_CHARS: usize = 500;

fn require_message(text: String) -> Result<String, ServiceError> {
    let text = text.trim().to_owned();
    if text.is_empty() {
        return Err(ServiceError::InvalidInput(
            "message must not be blank".into(),
        ));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "message must stay under {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(text)
}

async fn ensure_pad_exists(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    let store = state.store().read().await;
    if !store.board.pads.contains_key(&pad_id) {
        return Err(ServiceError::NotFound(format!("pad {pad_id}")));
    }
    Ok(())
}

/// Send one message into a pad channel.
///
/// A judge speaking in a channel counts as having seen the newest
/// unacknowledged urgent operator message there, so it gets stamped
/// along the way.
pub async fn send(
    state: &SharedState,
    from: ChatSender,
    pad_id: PadId,
    text: String,
    urgent: bool,
) -> Result<(), ServiceError> {
    let text = require_message(text)?;
    let _gate = state.command_gate().lock().await;
    ensure_pad_exists(state, pad_id).await?;

    let wall = wall_now_ms();
    {
        let mut chat = state.chat().write().await;
        if from == ChatSender::Judge {
            chat.ack_latest_urgent_from_admin(pad_id, wall);
        }
        chat.send(pad_id, from, text, urgent, wall);
    }

    debug!(pad_id, ?from, urgent, "chat message sent");
    state.request_chat_save();
    events::broadcast_chat_pad(state, pad_id).await;
    Ok(())
}

/// Acknowledge an urgent message by id.
///
/// Quietly does nothing when the message is unknown, not urgent or
/// already stamped, so double-clicks and races stay harmless.
pub async fn acknowledge(
    state: &SharedState,
    pad_id: PadId,
    message_id: Uuid,
) -> Result<(), ServiceError> {
    let _gate = state.command_gate().lock().await;

    let wall = wall_now_ms();
    let stamped = {
        let mut chat = state.chat().write().await;
        chat.acknowledge(pad_id, message_id, wall)
    };

    if stamped {
        state.request_chat_save();
        events::broadcast_chat_pad(state, pad_id).await;
    }
    Ok(())
}

/// Send one operator message into one or every pad channel.
pub async fn broadcast(
    state: &SharedState,
    target: Option<PadId>,
    text: String,
    urgent: bool,
) -> Result<(), ServiceError> {
    let text = require_message(text)?;
    let _gate = state.command_gate().lock().await;

    let pads: Vec<PadId> = {
        let store = state.store().read().await;
        match target {
            Some(pad_id) => {
                if !store.board.pads.contains_key(&pad_id) {
                    return Err(ServiceError::NotFound(format!("pad {pad_id}")));
                }
                vec![pad_id]
            }
            None => store.board.pads.keys().copied().collect(),
        }
    };
    if pads.is_empty() {
        return Err(ServiceError::InvalidState("no pads to message".into()));
    }

    let wall = wall_now_ms();
    {
        let mut chat = state.chat().write().await;
        chat.broadcast(&pads, ChatSender::Admin, &text, urgent, wall);
    }

    info!(pads = pads.len(), urgent, "operator message broadcast");
    state.request_chat_save();
    for pad_id in pads {
        events::broadcast_chat_pad(state, pad_id).await;
    }
    Ok(())
}

/// Snapshot of every channel, for the read endpoint.
pub async fn overview(state: &SharedState) -> ChatOverview {
    let chat = state.chat().read().await;
    ChatOverview::capture(&chat)
}
