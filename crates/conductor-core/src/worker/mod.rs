//! Agent workers
//!
//! This module handles:
//! - The worker lifecycle state machine (idle, running, error, stopped)
//! - Serialized message processing against a streamed completion
//! - The idle heartbeat and the per-worker diagnostic log

mod agent_worker;
mod log_buffer;

pub use agent_worker::AgentWorker;
pub use log_buffer::LogBuffer;
