//! File-backed session store.
//!
//! Layout, one directory per session under the store root:
//!
//! ```text
//! <root>/<session-id>/events.jsonl   one EventRecord per line, append-only
//! <root>/<session-id>/snapshot.json  latest SessionState
//! ```
//!
//! Snapshots are written to a temporary file and renamed into place, so a
//! crash leaves either the old snapshot or the new one. An event line torn
//! by a crash is dropped (with a warning) the next time the log is opened;
//! the snapshot written after it never happened, so no state is lost that
//! was ever published.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tempo_types::{EventRecord, SessionId, SessionState};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::SessionStore;
use crate::error::StoreError;

const EVENTS_FILE: &str = "events.jsonl";
const SNAPSHOT_FILE: &str = "snapshot.json";
const SNAPSHOT_TMP: &str = "snapshot.json.tmp";

/// A [`SessionStore`] persisting to the local filesystem.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    /// Last appended seq per session, loaded lazily from disk.
    ///
    /// Also serializes appends so two writers never interleave lines.
    last_seq: Mutex<BTreeMap<SessionId, u64>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        tracing::info!(root = %root.display(), "Opened file session store");
        Ok(Self {
            root,
            last_seq: Mutex::new(BTreeMap::new()),
        })
    }

    fn session_dir(&self, id: SessionId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn events_path(&self, id: SessionId) -> PathBuf {
        self.session_dir(id).join(EVENTS_FILE)
    }

    /// Read and decode the event log, tolerating a torn final line.
    async fn read_log(&self, id: SessionId) -> Result<Vec<EventRecord>, StoreError> {
        let path = self.events_path(id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let torn_tail = !content.is_empty() && !content.ends_with('\n');
        let lines: Vec<&str> = content.lines().collect();
        let mut records = Vec::with_capacity(lines.len());

        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) if torn_tail && index.saturating_add(1) == lines.len() => {
                    tracing::warn!(
                        session_id = %id,
                        error = %e,
                        "Ignoring torn final line in event log"
                    );
                }
                Err(e) => {
                    return Err(StoreError::Corrupt {
                        path,
                        line: index.saturating_add(1),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(records)
    }

    /// Drop a torn final line so the next append starts on a fresh line.
    async fn repair_tail(&self, id: SessionId) -> Result<(), StoreError> {
        let path = self.events_path(id);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        if content.last().is_none_or(|b| *b == b'\n') {
            return Ok(());
        }

        let keep = content
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i.saturating_add(1));
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.set_len(u64::try_from(keep).unwrap_or(u64::MAX))
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        tracing::warn!(session_id = %id, kept_bytes = keep, "Truncated torn event log tail");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn append(&self, record: &EventRecord) -> Result<(), StoreError> {
        let id = record.session_id;
        let mut last_seq = self.last_seq.lock().await;

        let last = if let Some(seq) = last_seq.get(&id) {
            *seq
        } else {
            self.repair_tail(id).await?;
            self.read_log(id).await?.last().map_or(0, |r| r.seq)
        };

        let expected = last.saturating_add(1);
        if record.seq != expected {
            return Err(StoreError::Conflict {
                session_id: id,
                expected,
                found: record.seq,
            });
        }

        let dir = self.session_dir(id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = self.events_path(id);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.sync_data()
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        last_seq.insert(id, record.seq);
        tracing::debug!(session_id = %id, seq = record.seq, kind = record.event.kind(), "Appended event");
        Ok(())
    }

    async fn save_snapshot(&self, state: &SessionState) -> Result<(), StoreError> {
        let dir = self.session_dir(state.id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = dir.join(SNAPSHOT_TMP);
        let target = dir.join(SNAPSHOT_FILE);

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &target)
            .await
            .map_err(|e| StoreError::io(&target, e))?;
        Ok(())
    }

    async fn load_snapshot(&self, id: SessionId) -> Result<Option<SessionState>, StoreError> {
        let path = self.session_dir(id).join(SNAPSHOT_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn load_events(&self, id: SessionId, after: u64) -> Result<Vec<EventRecord>, StoreError> {
        let mut records = self.read_log(id).await?;
        records.retain(|r| r.seq > after);
        Ok(records)
    }

    async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io(entry.path(), e))?
                .is_dir();
            if !is_dir {
                continue;
            }
            match entry.file_name().to_str().map(str::parse::<SessionId>) {
                Some(Ok(id)) => ids.push(id),
                _ => {
                    tracing::debug!(path = %entry.path().display(), "Skipping non-session directory");
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempo_types::{Outcome, Turn};

    use super::*;
    use crate::fixtures::*;
    use crate::recover;

    #[tokio::test]
    async fn log_and_snapshot_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.append(&created(id)).await.unwrap();
            let mut state = SessionState::from_created(&created(id)).unwrap();
            store.save_snapshot(&state).await.unwrap();
            store.append(&e4(id)).await.unwrap();
            state.apply(&e4(id)).unwrap();
            store.save_snapshot(&state).await.unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![id]);
        let state = recover(&store, id).await.unwrap();
        assert_eq!(state.version, 2);
        assert_eq!(state.fen, AFTER_E4);
        assert_eq!(state.turn, Turn::Machine);
        assert!(!dir.path().join(id.to_string()).join(SNAPSHOT_TMP).exists());
    }

    #[tokio::test]
    async fn reopened_store_continues_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        FileStore::open(dir.path())
            .await
            .unwrap()
            .append(&created(id))
            .await
            .unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();
        let err = store.append(&created(id)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 2, .. }));
        store.append(&e4(id)).await.unwrap();
        store.append(&resign(id, 3)).await.unwrap();

        let state = recover(&store, id).await.unwrap();
        assert_eq!(state.verdict.outcome, Outcome::Resignation);
    }

    #[tokio::test]
    async fn torn_tail_is_dropped_and_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.append(&created(id)).await.unwrap();

        let path = store.events_path(id);
        let mut file = fs::OpenOptions::new().append(true).open(&path).await.unwrap();
        file.write_all(b"{\"session_id\":").await.unwrap();
        drop(file);

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.load_events(id, 0).await.unwrap().len(), 1);
        reopened.append(&e4(id)).await.unwrap();
        assert_eq!(reopened.load_events(id, 0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn corrupt_middle_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.append(&created(id)).await.unwrap();

        let path = store.events_path(id);
        let mut file = fs::OpenOptions::new().append(true).open(&path).await.unwrap();
        file.write_all(b"not json\n").await.unwrap();
        drop(file);

        let err = store.load_events(id, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 2, .. }));
    }

    #[tokio::test]
    async fn list_skips_foreign_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        fs::create_dir_all(dir.path().join("lost+found")).await.unwrap();
        fs::write(dir.path().join("README"), b"hello").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
