//! Completion client contract
//!
//! A completion client streams one model response for an accumulated
//! turn history. The concrete transport lives outside this crate; the
//! worker only depends on the trait below.

#[cfg(test)]
pub(crate) mod testing;

use crate::error::Result;
use crate::types::{StopReason, ToolSet, Turn};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Incremental event from a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of assistant text
    TextDelta(String),
    /// The model asked for a tool
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Terminal event
    Stop(StopReason),
}

/// Stream of completion events; an `Err` item ends generation
pub type CompletionStream = BoxStream<'static, Result<StreamEvent>>;

/// Everything the completion service needs for one response
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub agent_id: String,
    pub model_id: String,
    pub system_prompt: String,
    pub history: Vec<Turn>,
    pub tools: ToolSet,
}

/// Streaming request/response to a language model backend.
///
/// Implementations do not need their own cancellation plumbing: the
/// worker stops polling the stream and drops it when it is cancelled.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Open a response stream for the request
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream>;

    /// Cheap liveness probe used by the worker heartbeat
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
