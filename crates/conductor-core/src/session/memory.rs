//! Process-local session store

use super::SessionStore;
use crate::error::{Error, Result, StorageError};
use crate::types::{Session, Turn};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Session store backed by a map; contents are lost on exit
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        agent_id: &str,
        model_id: &str,
        system_prompt: &str,
    ) -> Result<Session> {
        let session = Session::new(agent_id, model_id, system_prompt);
        debug!("Created session {} for agent {}", session.id, agent_id);
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn append(&self, session_id: &str, turn: Turn) -> Result<()> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(session_id).ok_or_else(|| {
            Error::Storage(StorageError::NotFound(format!("session {}", session_id)))
        })?;
        session.turns.push(turn);
        session.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<String>> {
        let sessions = self.sessions.read();
        let mut owned: Vec<&Session> = sessions
            .values()
            .filter(|s| s.agent_id == agent_id)
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned.into_iter().map(|s| s.id.clone()).collect())
    }
}
