//! Read-only projections of the chat channels.

use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    chat::{ChatMessage, ChatSender, ChatStore},
    pad::PadId,
};

/// Sending side of a chat message.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatSenderDto {
    Admin,
    Judge,
}

impl From<ChatSender> for ChatSenderDto {
    fn from(sender: ChatSender) -> Self {
        match sender {
            ChatSender::Admin => ChatSenderDto::Admin,
            ChatSender::Judge => ChatSenderDto::Judge,
        }
    }
}

/// One chat message as served to clients.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatMessageDto {
    pub id: Uuid,
    /// Wall-clock send instant, epoch ms.
    pub ts: i64,
    pub from: ChatSenderDto,
    pub text: String,
    pub urgent: bool,
    /// Wall-clock acknowledgement instant, absent while pending.
    pub acked_at: Option<i64>,
}

impl From<&ChatMessage> for ChatMessageDto {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            ts: message.ts,
            from: message.from.into(),
            text: message.text.clone(),
            urgent: message.urgent,
            acked_at: message.acked_at,
        }
    }
}

/// The recent window of one pad channel.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PadChatSnapshot {
    pub pad_id: PadId,
    /// Messages oldest first, capped to the snapshot window.
    pub messages: Vec<ChatMessageDto>,
}

impl PadChatSnapshot {
    /// Snapshot one channel of the store.
    pub fn capture(chat: &ChatStore, pad_id: PadId) -> Self {
        Self {
            pad_id,
            messages: chat.snapshot(pad_id).iter().map(Into::into).collect(),
        }
    }
}

/// Every channel at once, served on connect and over REST.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatOverview {
    pub channels: Vec<PadChatSnapshot>,
}

impl ChatOverview {
    /// Snapshot all channels of the store.
    pub fn capture(chat: &ChatStore) -> Self {
        Self {
            channels: chat
                .channels()
                .keys()
                .map(|pad_id| PadChatSnapshot::capture(chat, *pad_id))
                .collect(),
        }
    }
}
