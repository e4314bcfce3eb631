//! Per-pad chat channels with urgent-message acknowledgement.
//!
//! Chat lives beside the board rather than inside it: channels survive
//! queue mutations and undo, and they are the only state persisted to
//! disk between runs.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::pad::PadId;

/// Messages retained per channel in memory.
pub const CHANNEL_RETAIN: usize = 220;
/// Most recent messages served in snapshots and persisted to disk.
pub const CHANNEL_SNAPSHOT: usize = 120;

/// Side a chat message was sent from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSender {
    /// Operator console.
    Admin,
    /// Judge bound to the pad.
    Judge,
}

/// One chat message inside a pad channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message identifier, unique within its channel.
    pub id: Uuid,
    /// Wall-clock send instant, epoch ms.
    pub ts: i64,
    /// Sending side.
    pub from: ChatSender,
    /// Message text.
    pub text: String,
    /// Whether the message demands an acknowledgement.
    pub urgent: bool,
    /// Wall-clock instant the message was acknowledged, if it was.
    pub acked_at: Option<i64>,
}

/// All chat channels, keyed by pad number.
#[derive(Debug, Default)]
pub struct ChatStore {
    channels: BTreeMap<PadId, Vec<ChatMessage>>,
}

impl ChatStore {
    /// Rebuild the store from archived channels, capping each at
    /// [`CHANNEL_RETAIN`] newest messages.
    pub fn from_channels(mut channels: BTreeMap<PadId, Vec<ChatMessage>>) -> Self {
        for messages in channels.values_mut() {
            let len = messages.len();
            if len > CHANNEL_RETAIN {
                messages.drain(..len - CHANNEL_RETAIN);
            }
        }
        Self { channels }
    }

    /// All channels, keyed by pad number.
    pub fn channels(&self) -> &BTreeMap<PadId, Vec<ChatMessage>> {
        &self.channels
    }

    /// Append a new message to a pad channel and return a copy of it.
    pub fn send(
        &mut self,
        pad_id: PadId,
        from: ChatSender,
        text: String,
        urgent: bool,
        ts: i64,
    ) -> ChatMessage {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            ts,
            from,
            text,
            urgent,
            acked_at: None,
        };
        self.push(pad_id, message.clone());
        message
    }

    /// Append one message built by the sender to several pads at once.
    ///
    /// Each pad receives its own copy so acknowledgements stay per pad.
    pub fn broadcast(
        &mut self,
        pads: &[PadId],
        from: ChatSender,
        text: &str,
        urgent: bool,
        ts: i64,
    ) -> Vec<PadId> {
        let id = Uuid::new_v4();
        for pad_id in pads {
            self.push(
                *pad_id,
                ChatMessage {
                    id,
                    ts,
                    from,
                    text: text.to_owned(),
                    urgent,
                    acked_at: None,
                },
            );
        }
        pads.to_vec()
    }

    /// Acknowledge an urgent message by id.
    ///
    /// No-op when the message is unknown, not urgent, or already
    /// acknowledged. Returns whether a stamp was written.
    pub fn acknowledge(&mut self, pad_id: PadId, message_id: Uuid, ts: i64) -> bool {
        let Some(messages) = self.channels.get_mut(&pad_id) else {
            return false;
        };
        let Some(message) = messages.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        if !message.urgent || message.acked_at.is_some() {
            return false;
        }
        message.acked_at = Some(ts);
        true
    }

    /// Acknowledge the newest unacknowledged urgent operator message in a
    /// channel, meaning judge activity in the channel counts as having
    /// seen it. Returns the stamped message id, if any.
    pub fn ack_latest_urgent_from_admin(&mut self, pad_id: PadId, ts: i64) -> Option<Uuid> {
        let messages = self.channels.get_mut(&pad_id)?;
        let message = messages
            .iter_mut()
            .rev()
            .find(|m| m.from == ChatSender::Admin && m.urgent && m.acked_at.is_none())?;
        message.acked_at = Some(ts);
        Some(message.id)
    }

    /// Most recent messages of one channel, oldest first, capped at
    /// [`CHANNEL_SNAPSHOT`].
    pub fn snapshot(&self, pad_id: PadId) -> Vec<ChatMessage> {
        match self.channels.get(&pad_id) {
            Some(messages) => {
                let skip = messages.len().saturating_sub(CHANNEL_SNAPSHOT);
                messages[skip..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Drop a channel entirely, for pads that no longer exist.
    pub fn remove_channel(&mut self, pad_id: PadId) -> bool {
        self.channels.remove(&pad_id).is_some()
    }

    fn push(&mut self, pad_id: PadId, message: ChatMessage) {
        let messages = self.channels.entry(pad_id).or_default();
        messages.push(message);
        let len = messages.len();
        if len > CHANNEL_RETAIN {
            messages.drain(..len - CHANNEL_RETAIN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_appends_in_order() {
        let mut store = ChatStore::default();
        store.send(1, ChatSender::Admin, "two minutes".to_owned(), false, 10);
        store.send(1, ChatSender::Judge, "copy".to_owned(), false, 20);

        let snapshot = store.snapshot(1);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].text, "two minutes");
        assert_eq!(snapshot[1].from, ChatSender::Judge);
        assert!(store.snapshot(2).is_empty());
    }

    #[test]
    fn retention_drops_the_oldest_messages() {
        let mut store = ChatStore::default();
        for n in 0..CHANNEL_RETAIN as i64 + 30 {
            store.send(1, ChatSender::Admin, n.to_string(), false, n);
        }

        let channel = &store.channels()[&1];
        assert_eq!(channel.len(), CHANNEL_RETAIN);
        assert_eq!(channel.first().map(|m| m.ts), Some(30));
    }

    #[test]
    fn snapshot_serves_only_the_newest_window() {
        let mut store = ChatStore::default();
        for n in 0..CHANNEL_RETAIN as i64 {
            store.send(4, ChatSender::Admin, n.to_string(), false, n);
        }

        let snapshot = store.snapshot(4);
        assert_eq!(snapshot.len(), CHANNEL_SNAPSHOT);
        assert_eq!(
            snapshot.first().map(|m| m.ts),
            Some((CHANNEL_RETAIN - CHANNEL_SNAPSHOT) as i64)
        );
        assert_eq!(snapshot.last().map(|m| m.ts), Some(CHANNEL_RETAIN as i64 - 1));
    }

    #[test]
    fn acknowledge_stamps_urgent_messages_once() {
        let mut store = ChatStore::default();
        let plain = store.send(1, ChatSender::Admin, "fyi".to_owned(), false, 10);
        let urgent = store.send(1, ChatSender::Admin, "hold the pad".to_owned(), true, 20);

        assert!(!store.acknowledge(1, plain.id, 30));
        assert!(store.acknowledge(1, urgent.id, 30));
        assert!(!store.acknowledge(1, urgent.id, 40), "second ack is a no-op");

        let snapshot = store.snapshot(1);
        assert_eq!(snapshot[1].acked_at, Some(30));
        assert_eq!(snapshot[0].acked_at, None);
    }

    #[test]
    fn acknowledging_through_the_wrong_pad_changes_nothing() {
        let mut store = ChatStore::default();
        let urgent = store.send(1, ChatSender::Admin, "hold the pad".to_owned(), true, 10);

        assert!(!store.acknowledge(2, urgent.id, 20));
        assert_eq!(store.snapshot(1)[0].acked_at, None);
    }

    #[test]
    fn judge_activity_acks_the_newest_admin_urgent() {
        let mut store = ChatStore::default();
        let first = store.send(1, ChatSender::Admin, "check scores".to_owned(), true, 10);
        let second = store.send(1, ChatSender::Admin, "hold the pad".to_owned(), true, 20);
        store.send(1, ChatSender::Judge, "noted".to_owned(), true, 25);

        let acked = store.ack_latest_urgent_from_admin(1, 30);
        assert_eq!(acked, Some(second.id));
        // Judge-sent urgency is never self-acknowledged.
        let again = store.ack_latest_urgent_from_admin(1, 40);
        assert_eq!(again, Some(first.id));
        assert_eq!(store.ack_latest_urgent_from_admin(1, 50), None);
    }

    #[test]
    fn broadcast_clones_carry_independent_acks() {
        let mut store = ChatStore::default();
        let pads = store.broadcast(&[1, 2], ChatSender::Admin, "weather hold", true, 10);
        assert_eq!(pads, vec![1, 2]);

        let id = store.snapshot(1)[0].id;
        assert_eq!(store.snapshot(2)[0].id, id);
        assert!(store.acknowledge(1, id, 20));

        assert_eq!(store.snapshot(1)[0].acked_at, Some(20));
        assert_eq!(store.snapshot(2)[0].acked_at, None);
    }

    #[test]
    fn from_channels_caps_oversized_archives() {
        let mut oversized = Vec::new();
        for n in 0..CHANNEL_RETAIN as i64 + 50 {
            oversized.push(ChatMessage {
                id: Uuid::new_v4(),
                ts: n,
                from: ChatSender::Admin,
                text: n.to_string(),
                urgent: false,
                acked_at: None,
            });
        }
        let store = ChatStore::from_channels(BTreeMap::from([(9, oversized)]));

        let channel = &store.channels()[&9];
        assert_eq!(channel.len(), CHANNEL_RETAIN);
        assert_eq!(channel.first().map(|m| m.ts), Some(50));
    }

    #[test]
    fn remove_channel_forgets_the_pad() {
        let mut store = ChatStore::default();
        store.send(3, ChatSender::Admin, "bye".to_owned(), false, 1);
        assert!(store.remove_channel(3));
        assert!(!store.remove_channel(3));
        assert!(store.snapshot(3).is_empty());
    }
}
