use std::collections::BTreeMap;

use futures::future::BoxFuture;

use crate::dao::models::ChatArchiveDoc;
use crate::dao::storage::StorageResult;
use crate::state::chat::ChatMessage;
use crate::state::pad::PadId;

/// Abstraction over the persistence layer for chat channels.
///
/// The board itself is deliberately ephemeral; chat is the only state
/// that survives a restart. Implementations must tolerate partially
/// corrupted archives on load instead of refusing to boot.
pub trait ChatArchive: Send + Sync {
    /// Read every archived channel, dropping entries that cannot be
    /// decoded safely.
    fn load(&self) -> BoxFuture<'static, StorageResult<BTreeMap<PadId, Vec<ChatMessage>>>>;
    /// Replace the archive with the given document.
    fn save(&self, doc: ChatArchiveDoc) -> BoxFuture<'static, StorageResult<()>>;
}
