//! Session persistence
//!
//! This module handles:
//! - The `SessionStore` contract for durable, keyed conversation history
//! - An in-process store and a SQLite-backed store
//! - `SessionBridge`, the stateless adapter workers talk to

mod bridge;
mod memory;
mod sqlite;

pub use bridge::SessionBridge;
pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::error::Result;
use crate::types::{Session, Turn};
use async_trait::async_trait;

/// Durable conversation history. Only the store mutates session content.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create an empty session
    async fn create(&self, agent_id: &str, model_id: &str, system_prompt: &str)
        -> Result<Session>;

    /// Load a session with all of its turns
    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// Append one turn. Fails with `StorageError::NotFound` for unknown sessions.
    async fn append(&self, session_id: &str, turn: Turn) -> Result<()>;

    /// Session ids belonging to an agent, most recently updated first
    async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<String>>;
}
