//! Session bridge
//!
//! Translates worker message operations into session store calls. Holds
//! no state of its own; cloning it shares the underlying store.

use super::SessionStore;
use crate::error::Result;
use crate::types::{Session, Turn};
use std::sync::Arc;

#[derive(Clone)]
pub struct SessionBridge {
    store: Arc<dyn SessionStore>,
}

impl SessionBridge {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Create a session and return its id
    pub async fn create_session(
        &self,
        agent_id: &str,
        model_id: &str,
        system_prompt: &str,
    ) -> Result<String> {
        let session = self.store.create(agent_id, model_id, system_prompt).await?;
        Ok(session.id)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.store.get(session_id).await
    }

    pub async fn append_turn(&self, session_id: &str, turn: Turn) -> Result<()> {
        self.store.append(session_id, turn).await
    }

    /// Ordered turns of a session, or `None` if it does not exist
    pub async fn turns(&self, session_id: &str) -> Result<Option<Vec<Turn>>> {
        Ok(self.store.get(session_id).await?.map(|s| s.turns))
    }

    pub async fn sessions_for_agent(&self, agent_id: &str) -> Result<Vec<String>> {
        self.store.list_for_agent(agent_id).await
    }
}
