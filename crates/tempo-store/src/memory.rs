//! In-process session store.
//!
//! Holds every log and snapshot in a `tokio::sync::RwLock`-guarded map.
//! Nothing survives the process, so this backs tests and the
//! `storage.backend: memory` configuration.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tempo_types::{EventRecord, SessionId, SessionState};
use tokio::sync::RwLock;

use crate::SessionStore;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Entry {
    events: Vec<EventRecord>,
    snapshot: Option<SessionState>,
}

/// A [`SessionStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<BTreeMap<SessionId, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn append(&self, record: &EventRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(record.session_id).or_default();

        let last = entry.events.last().map_or(0, |r| r.seq);
        let expected = last.saturating_add(1);
        if record.seq != expected {
            return Err(StoreError::Conflict {
                session_id: record.session_id,
                expected,
                found: record.seq,
            });
        }

        entry.events.push(record.clone());
        Ok(())
    }

    async fn save_snapshot(&self, state: &SessionState) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(state.id).or_default().snapshot = Some(state.clone());
        Ok(())
    }

    async fn load_snapshot(&self, id: SessionId) -> Result<Option<SessionState>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).and_then(|e| e.snapshot.clone()))
    }

    async fn load_events(&self, id: SessionId, after: u64) -> Result<Vec<EventRecord>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&id)
            .map(|e| {
                e.events
                    .iter()
                    .filter(|r| r.seq > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().copied().collect())
    }
}
