//! Scripted completion client for tests

use super::{CompletionClient, CompletionRequest, CompletionStream, StreamEvent};
use crate::error::{Error, Result};
use crate::types::StopReason;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, Semaphore};

#[derive(Debug, Clone)]
enum Script {
    /// Emit the events and end
    Events(Vec<StreamEvent>),
    /// Emit the events and never end
    Hang(Vec<StreamEvent>),
    /// Emit the events, then an error item
    FailMidStream(Vec<StreamEvent>, String),
    /// Fail before a stream is opened
    FailToOpen(String),
}

pub(crate) struct ScriptedClient {
    script: Script,
    unhealthy: AtomicBool,
    panic_on_probe: AtomicBool,
    requests: Mutex<Vec<CompletionRequest>>,
    /// When set, each opened stream waits for one permit
    gate: Option<Semaphore>,
    /// Notified each time a stream is opened
    pub opened: Notify,
}

impl ScriptedClient {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            unhealthy: AtomicBool::new(false),
            panic_on_probe: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            gate: None,
            opened: Notify::new(),
        }
    }

    /// Replies with `text` in two deltas, then `end_turn`
    pub fn replying(text: &str) -> Self {
        let (head, tail) = text.split_at(text.len() / 2);
        Self::events(vec![
            StreamEvent::TextDelta(head.to_string()),
            StreamEvent::TextDelta(tail.to_string()),
            StreamEvent::Stop(StopReason::EndTurn),
        ])
    }

    /// Like `replying`, but every stream is held until `release`
    pub fn gated(text: &str) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::replying(text)
        }
    }

    pub fn events(events: Vec<StreamEvent>) -> Self {
        Self::with_script(Script::Events(events))
    }

    pub fn hanging() -> Self {
        Self::with_script(Script::Hang(vec![StreamEvent::TextDelta(
            "partial".to_string(),
        )]))
    }

    pub fn failing_mid_stream(message: &str) -> Self {
        Self::with_script(Script::FailMidStream(
            vec![StreamEvent::TextDelta("partial".to_string())],
            message.to_string(),
        ))
    }

    pub fn failing_to_open(message: &str) -> Self {
        Self::with_script(Script::FailToOpen(message.to_string()))
    }

    /// Let `streams` held streams proceed
    pub fn release(&self, streams: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(streams);
        }
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Makes heartbeat probes panic inside the heartbeat task
    pub fn set_panic_on_probe(&self, panic: bool) {
        self.panic_on_probe.store(panic, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        self.requests.lock().push(request);
        self.opened.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?
                .forget();
        }

        let stream = match self.script.clone() {
            Script::Events(events) => stream::iter(events.into_iter().map(Ok)).boxed(),
            Script::Hang(events) => stream::iter(events.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed(),
            Script::FailMidStream(events, message) => stream::iter(events.into_iter().map(Ok))
                .chain(stream::once(async move { Err(Error::Internal(message)) }))
                .boxed(),
            Script::FailToOpen(message) => return Err(Error::Internal(message)),
        };

        Ok(stream)
    }

    async fn health_check(&self) -> Result<()> {
        if self.panic_on_probe.load(Ordering::SeqCst) {
            panic!("scripted probe panic");
        }
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(Error::Internal("completion service unreachable".to_string()));
        }
        Ok(())
    }
}
