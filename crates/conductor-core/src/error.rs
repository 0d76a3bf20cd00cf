//! Error types for Conductor Core

use serde::Serialize;
use thiserror::Error;

/// Main error type for Conductor operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Agent runtime errors. Every variant names the agent it originated from.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent not found in catalog: {0}")]
    NotInCatalog(String),

    #[error("No worker registered for agent: {0}")]
    NotRegistered(String),

    #[error("Agent already running: {0}")]
    AlreadyRunning(String),

    #[error("Agent not running: {0}")]
    NotRunning(String),

    #[error("Agent busy: {0}")]
    Busy(String),

    #[error("Generation aborted for agent: {0}")]
    Aborted(String),

    #[error("Session not found for agent {agent_id}: {session_id}")]
    SessionNotFound { agent_id: String, session_id: String },

    #[error("Generation failed for agent {agent_id}: {message}")]
    GenerationFailed { agent_id: String, message: String },

    #[error("Failed to stop agent {agent_id}: {message}")]
    StopFailed { agent_id: String, message: String },

    #[error("Session store failed for agent {agent_id}: {message}")]
    SessionStoreFailed { agent_id: String, message: String },
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Stable error classification a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AgentNotFound,
    AlreadyRunning,
    NotRunning,
    NotFound,
    SessionNotFound,
    Busy,
    Aborted,
    GenerationFailed,
    StopFailed,
    Storage,
    Internal,
}

impl ErrorKind {
    /// Whether retrying the same call later may succeed without reconfiguration.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Busy | Self::Aborted)
    }
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInCatalog(_) => ErrorKind::AgentNotFound,
            Self::NotRegistered(_) => ErrorKind::NotFound,
            Self::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            Self::NotRunning(_) => ErrorKind::NotRunning,
            Self::Busy(_) => ErrorKind::Busy,
            Self::Aborted(_) => ErrorKind::Aborted,
            Self::SessionNotFound { .. } => ErrorKind::SessionNotFound,
            Self::GenerationFailed { .. } => ErrorKind::GenerationFailed,
            Self::StopFailed { .. } => ErrorKind::StopFailed,
            Self::SessionStoreFailed { .. } => ErrorKind::Storage,
        }
    }

    pub fn agent_id(&self) -> &str {
        match self {
            Self::NotInCatalog(id)
            | Self::NotRegistered(id)
            | Self::AlreadyRunning(id)
            | Self::NotRunning(id)
            | Self::Busy(id)
            | Self::Aborted(id) => id,
            Self::SessionNotFound { agent_id, .. }
            | Self::GenerationFailed { agent_id, .. }
            | Self::StopFailed { agent_id, .. }
            | Self::SessionStoreFailed { agent_id, .. } => agent_id,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Agent(e) => e.kind(),
            Error::Storage(_) => ErrorKind::Storage,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The agent this failure originated from, when it came from the runtime.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Error::Agent(e) => Some(e.agent_id()),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        Error::Storage(StorageError::Pool(err.to_string()))
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
