//! In-process checkpoint store. Not persistent.

use super::{session_title, Checkpoint, CheckpointStore, StoredSession};
use crate::agent::Session;
use crate::error::{Result, StepwiseError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Checkpoint store backed by a map
#[derive(Default)]
pub struct MemoryCheckpointStore {
    inner: RwLock<HashMap<String, (StoredSession, Checkpoint)>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, (StoredSession, Checkpoint)>>> {
        self.inner
            .read()
            .map_err(|_| StepwiseError::Storage("Checkpoint map lock poisoned".into()).into())
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, (StoredSession, Checkpoint)>>> {
        self.inner
            .write()
            .map_err(|_| StepwiseError::Storage("Checkpoint map lock poisoned".into()).into())
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, session: &Session, model: Option<&str>) -> Result<()> {
        let now = Utc::now();
        let title = session_title(session);
        let messages = session.conversation.messages().to_vec();

        let mut map = self.write()?;
        let created_at = map
            .get(&session.id)
            .map(|(meta, _)| meta.created_at)
            .unwrap_or(now);

        let meta = StoredSession {
            id: session.id.clone(),
            title: title.clone(),
            created_at,
            updated_at: now,
            model: model.map(str::to_string),
            message_count: messages.len(),
        };
        let checkpoint = Checkpoint {
            id: session.id.clone(),
            title,
            model: model.map(str::to_string),
            messages,
        };
        map.insert(session.id.clone(), (meta, checkpoint));
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.read()?.get(id).map(|(_, checkpoint)| checkpoint.clone()))
    }

    fn list(&self) -> Result<Vec<StoredSession>> {
        let mut sessions: Vec<StoredSession> =
            self.read()?.values().map(|(meta, _)| meta.clone()).collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.write()?.remove(id).is_some())
    }
}
