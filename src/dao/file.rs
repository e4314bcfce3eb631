//! Chat archive backed by a single JSON file on local disk.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::dao::archive::ChatArchive;
use crate::dao::models::{ChatArchiveDoc, channels_from_value};
use crate::dao::storage::{StorageError, StorageResult};
use crate::state::chat::ChatMessage;
use crate::state::pad::PadId;

/// File-based [`ChatArchive`] writing atomically via a sibling temp file.
pub struct JsonFileArchive {
    path: PathBuf,
}

impl JsonFileArchive {
    /// Archive rooted at the given file path. Parent directories are
    /// created lazily on the first save.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ChatArchive for JsonFileArchive {
    fn load(&self) -> BoxFuture<'static, StorageResult<BTreeMap<PadId, Vec<ChatMessage>>>> {
        let path = self.path.clone();
        Box::pin(async move {
            let contents = match fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    info!(path = %path.display(), "no chat archive yet; starting empty");
                    return Ok(BTreeMap::new());
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "cannot read chat archive; starting empty"
                    );
                    return Ok(BTreeMap::new());
                }
            };

            match serde_json::from_str::<Value>(&contents) {
                Ok(value) => Ok(channels_from_value(&value)),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "chat archive is not valid JSON; starting empty"
                    );
                    Ok(BTreeMap::new())
                }
            }
        })
    }

    fn save(&self, doc: ChatArchiveDoc) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move { write_atomic(&path, &doc).await })
    }
}

/// Serialize the document next to its destination and rename it in place,
/// so a crash mid-write can never leave a truncated archive behind.
async fn write_atomic(path: &Path, doc: &ChatArchiveDoc) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(doc)
        .map_err(|err| StorageError::unavailable("cannot encode chat archive".into(), err))?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|err| {
            StorageError::unavailable(
                format!("cannot create archive directory {}", parent.display()),
                err,
            )
        })?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, &json).await.map_err(|err| {
        StorageError::unavailable(format!("cannot write {}", tmp_path.display()), err)
    })?;
    fs::rename(&tmp_path, path).await.map_err(|err| {
        StorageError::unavailable(format!("cannot move archive into {}", path.display()), err)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{ChatMessageRecord, SenderRecord};
    use uuid::Uuid;

    fn record(ts: i64, text: &str) -> ChatMessageRecord {
        ChatMessageRecord {
            id: Uuid::new_v4(),
            ts,
            from: SenderRecord::Admin,
            text: text.to_owned(),
            urgent: false,
            acked_at: None,
        }
    }

    #[tokio::test]
    async fn save_then_load_preserves_channels_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonFileArchive::new(dir.path().join("chat.json"));
        let doc = ChatArchiveDoc {
            channels: BTreeMap::from([
                (1, vec![record(10, "first"), record(20, "second")]),
                (3, vec![record(5, "other pad")]),
            ]),
        };

        archive.save(doc).await.unwrap();
        let channels = archive.load().await.unwrap();

        assert_eq!(channels.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        let texts: Vec<_> = channels[&1].iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("deep").join("chat.json");
        let archive = JsonFileArchive::new(nested.clone());

        archive
            .save(ChatArchiveDoc {
                channels: BTreeMap::new(),
            })
            .await
            .unwrap();

        assert!(nested.exists());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.json");
        let archive = JsonFileArchive::new(path.clone());

        archive
            .save(ChatArchiveDoc {
                channels: BTreeMap::from([(2, vec![record(1, "hi")])]),
            })
            .await
            .unwrap();

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().into_string().unwrap());
        }
        assert_eq!(names, vec!["chat.json".to_owned()]);
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonFileArchive::new(dir.path().join("nope.json"));
        assert!(archive.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.json");
        fs::write(&path, b"{not json").await.unwrap();

        let archive = JsonFileArchive::new(path);
        assert!(archive.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_into_unwritable_location_errors() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("chat.json");
        fs::create_dir_all(&path).await.unwrap();

        let archive = JsonFileArchive::new(path);
        let result = archive
            .save(ChatArchiveDoc {
                channels: BTreeMap::new(),
            })
            .await;

        assert!(result.is_err());
    }
}
