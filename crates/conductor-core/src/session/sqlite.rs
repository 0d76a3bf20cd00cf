//! SQLite-backed session store

use super::SessionStore;
use crate::error::Result;
use crate::storage::{self, Storage};
use crate::types::{Session, Turn};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Session store persisting sessions and turns through [`Storage`]
pub struct SqliteSessionStore {
    storage: Arc<Storage>,
}

impl SqliteSessionStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(
        &self,
        agent_id: &str,
        model_id: &str,
        system_prompt: &str,
    ) -> Result<Session> {
        let session = Session::new(agent_id, model_id, system_prompt);
        let conn = self.storage.connection()?;
        storage::insert_session(&conn, &session)?;
        debug!("Persisted session {} for agent {}", session.id, agent_id);
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.storage.connection()?;
        storage::get_session(&conn, session_id)
    }

    async fn append(&self, session_id: &str, turn: Turn) -> Result<()> {
        let mut conn = self.storage.connection()?;
        let tx = conn.transaction()?;
        storage::append_turn(&tx, session_id, &turn)?;
        tx.commit()?;
        Ok(())
    }

    async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<String>> {
        let conn = self.storage.connection()?;
        storage::list_agent_sessions(&conn, agent_id)
    }
}
