//! Fixed-capacity diagnostic log for one worker

use crate::types::{LogEntry, LogLevel};
use std::collections::VecDeque;

/// Ring buffer of log entries; the oldest entry is evicted when full
#[derive(Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    min_level: LogLevel,
}

impl LogBuffer {
    pub fn new(capacity: usize, min_level: LogLevel) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            min_level,
        }
    }

    /// Record an entry. Returns `false` if it was below the buffer's level.
    pub fn push(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        context: Option<serde_json::Value>,
    ) -> bool {
        if level < self.min_level {
            return false;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp: chrono::Utc::now(),
            level,
            message: message.into(),
            context,
        });
        true
    }

    /// The most recent `limit` entries (all when `None`), oldest first
    pub fn recent(&self, limit: Option<usize>) -> Vec<LogEntry> {
        let skip = limit
            .map(|n| self.entries.len().saturating_sub(n))
            .unwrap_or(0);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
