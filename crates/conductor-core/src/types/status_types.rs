//! Worker lifecycle and status snapshot types

use super::{LogLevel, WorkerConfig};
use serde::{Deserialize, Serialize};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Built but never started
    Idle,
    /// Started and accepting messages
    Running,
    /// A background failure occurred; still accepts messages
    Error,
    /// Stopped explicitly
    Stopped,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Idle
    }
}

impl WorkerState {
    /// Whether the worker still owns a live heartbeat and accepts messages
    pub fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Error)
    }
}

/// Point-in-time status of one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub worker_id: String,
    pub agent_id: String,
    pub state: WorkerState,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub stopped_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
    /// Derived when the snapshot is taken
    pub uptime_ms: Option<u64>,
    pub current_session_id: Option<String>,
    pub total_sessions: u64,
    pub active_session_count: usize,
    pub messages_processed: u64,
    pub tools_executed: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub config: WorkerConfig,
}

impl WorkerStatus {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            worker_id: config.id.clone(),
            agent_id: config.agent_id.clone(),
            state: WorkerState::Idle,
            started_at: None,
            stopped_at: None,
            last_activity: None,
            uptime_ms: None,
            current_session_id: None,
            total_sessions: 0,
            active_session_count: 0,
            messages_processed: 0,
            tools_executed: 0,
            error_count: 0,
            last_error: None,
            config,
        }
    }

    /// Copy of this status with `uptime_ms` computed against `now`
    pub fn snapshot_at(&self, now: chrono::DateTime<chrono::Utc>) -> Self {
        let mut snapshot = self.clone();
        snapshot.uptime_ms = self.started_at.map(|started| {
            let end = match (self.state, self.stopped_at) {
                (WorkerState::Stopped, Some(stopped)) => stopped,
                _ => now,
            };
            (end - started).num_milliseconds().max(0) as u64
        });
        snapshot
    }
}

/// One entry in a worker's diagnostic ring buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Outcome of stopping every registered worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownReport {
    pub stopped: Vec<String>,
    /// Agent id and failure message for each worker that did not stop cleanly
    pub failed: Vec<(String, String)>,
}

impl ShutdownReport {
    pub fn succeeded(&self) -> usize {
        self.stopped.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
