//! Conductor Core Library
//!
//! This crate provides the agent runtime for Conductor, including:
//! - A catalog of agent definitions
//! - Per-agent workers with a lifecycle state machine
//! - An orchestrator that owns at most one worker per agent
//! - Conversation sessions persisted to SQLite
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     conductor-core                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  agent/        - Orchestrator, worker registry              │
//! │  worker/       - Agent worker, heartbeat, log buffer        │
//! │  session/      - Session bridge and stores                  │
//! │  catalog/      - Agent definitions lookup                   │
//! │  completion/   - Streaming completion client seam           │
//! │  storage/      - SQLite database, queries                   │
//! │  types/        - Shared type definitions                    │
//! │  config.rs     - Runtime settings                           │
//! │  logging.rs    - Tracing subscriber setup                   │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod storage;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export runtime components
pub use agent::{AgentOrchestrator, StartAgentRequest};
pub use catalog::{AgentCatalog, StaticCatalog};
pub use completion::{CompletionClient, CompletionRequest, CompletionStream, StreamEvent};
pub use config::{AutoStartAgent, RuntimeSettings};
pub use logging::init_logging;
pub use session::{MemorySessionStore, SessionBridge, SessionStore, SqliteSessionStore};
pub use worker::AgentWorker;

// Re-export storage
pub use storage::Storage;
