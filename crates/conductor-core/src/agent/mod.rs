//! Agent orchestration
//!
//! This module handles:
//! - The registry of running workers, one per agent
//! - Agent start, stop and restart
//! - Routing messages to the right worker
//! - Concurrent shutdown of every worker

mod orchestrator;

pub use orchestrator::{AgentOrchestrator, StartAgentRequest};
