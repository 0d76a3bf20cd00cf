//! Runtime settings
//!
//! Settings are stored as one JSON document in the storage `settings`
//! table. Per-start `WorkerOptions` are layered on top to produce the
//! immutable `WorkerConfig` of each worker.

use crate::error::Result;
use crate::storage::{self, Storage};
use crate::types::{LogLevel, WorkerConfig, WorkerOptions};
use serde::{Deserialize, Serialize};
use tracing::warn;

const SETTINGS_KEY: &str = "runtime_settings";

/// Agent started by `start_autostart_agents`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoStartAgent {
    pub agent_id: String,
    pub model_id: Option<String>,
}

/// Orchestrator-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    /// Model used when restarting an agent
    pub default_model_id: String,
    pub heartbeat_interval_ms: u64,
    pub log_capacity: usize,
    pub message_queue_depth: usize,
    pub max_concurrent_sessions: u32,
    pub log_level: LogLevel,
    pub autostart: Vec<AutoStartAgent>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            default_model_id: "claude-sonnet-4-5".to_string(),
            heartbeat_interval_ms: 30_000,
            log_capacity: 1000,
            message_queue_depth: 0,
            max_concurrent_sessions: 10,
            log_level: LogLevel::Info,
            autostart: Vec::new(),
        }
    }
}

impl RuntimeSettings {
    /// Load settings from storage, falling back to defaults
    pub fn load(storage: &Storage) -> Result<Self> {
        let conn = storage.connection()?;
        let raw = storage::get_setting(&conn, SETTINGS_KEY)?;

        Ok(match raw {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable runtime settings: {}", e);
                Self::default()
            }),
            None => Self::default(),
        })
    }

    pub fn save(&self, storage: &Storage) -> Result<()> {
        let conn = storage.connection()?;
        storage::set_setting(&conn, SETTINGS_KEY, &serde_json::to_string(self)?)
    }

    /// Build the immutable configuration of a new worker
    pub fn worker_config(
        &self,
        agent_id: &str,
        model_id: &str,
        options: &WorkerOptions,
    ) -> WorkerConfig {
        WorkerConfig {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            model_id: model_id.to_string(),
            auto_start: options.auto_start.unwrap_or(false),
            max_concurrent_sessions: options
                .max_concurrent_sessions
                .unwrap_or(self.max_concurrent_sessions),
            log_level: options.log_level.unwrap_or(self.log_level),
            message_queue_depth: options
                .message_queue_depth
                .unwrap_or(self.message_queue_depth),
            heartbeat_interval_ms: options
                .heartbeat_interval_ms
                .unwrap_or(self.heartbeat_interval_ms)
                .max(1),
            log_capacity: options.log_capacity.unwrap_or(self.log_capacity).max(1),
        }
    }
}
