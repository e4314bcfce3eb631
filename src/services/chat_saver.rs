//! Background writer that archives chat with a coalescing window.
//!
//! Mutating paths fire [`SaverHandle::request_save`] and move on. The
//! saver sleeps out a window anchored at the first request, swallows
//! every request that arrived meanwhile and writes one snapshot of the
//! state as it stands at flush time. Failed writes flip the shared
//! degraded flag until a later write goes through.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        archive::ChatArchive,
        models::{ChatArchiveDoc, ChatMessageRecord},
    },
    services::events,
    state::{
        SharedState,
        chat::{CHANNEL_SNAPSHOT, ChatStore},
    },
};

/// Cheap cloneable handle mutating paths use to request an archive write.
#[derive(Clone)]
pub struct SaverHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl SaverHandle {
    /// Ask for a write soon. Never blocks; requests inside an open
    /// window coalesce into the one pending write.
    pub fn request_save(&self) {
        let _ = self.tx.send(());
    }
}

/// Receiving side handed to [`run`].
pub struct SaveQueue {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Create the request channel between the state and the saver task.
pub fn channel() -> (SaverHandle, SaveQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SaverHandle { tx }, SaveQueue { rx })
}

/// Drive the saver until every [`SaverHandle`] is gone.
pub async fn run(state: SharedState, queue: SaveQueue, archive: Arc<dyn ChatArchive>) {
    let mut rx = queue.rx;
    let window = Duration::from_millis(state.config().chat_save_window_ms);

    while rx.recv().await.is_some() {
        tokio::time::sleep(window).await;
        while rx.try_recv().is_ok() {}

        let doc = {
            let chat = state.chat().read().await;
            archive_doc(&chat)
        };

        let was_degraded = state.is_degraded();
        match archive.save(doc).await {
            Ok(()) => {
                if was_degraded {
                    info!("chat archive writable again; leaving degraded mode");
                    state.set_degraded(false);
                    events::broadcast_health(&state, false);
                } else {
                    debug!("chat archive written");
                }
            }
            Err(err) => {
                if was_degraded {
                    warn!(error = %err, "chat archive write failed");
                } else {
                    warn!(error = %err, "chat archive write failed; entering degraded mode");
                    state.set_degraded(true);
                    events::broadcast_health(&state, true);
                }
            }
        }
    }

    info!("chat saver stopped");
}

/// Project the in-memory channels into the durable document, capping
/// each channel at the snapshot size.
fn archive_doc(chat: &ChatStore) -> ChatArchiveDoc {
    let channels = chat
        .channels()
        .iter()
        .map(|(pad_id, messages)| {
            let skip = messages.len().saturating_sub(CHANNEL_SNAPSHOT);
            let records: Vec<ChatMessageRecord> =
                messages[skip..].iter().map(ChatMessageRecord::from).collect();
            (*pad_id, records)
        })
        .collect();
    ChatArchiveDoc { channels }
}
