//! Core type definitions for Conductor
//!
//! This module contains the shared value types used across the runtime:
//! agent definitions and worker configuration, sessions and turns, and
//! worker status snapshots.

mod agent_types;
mod session_types;
mod status_types;

pub use agent_types::*;
pub use session_types::*;
pub use status_types::*;
