//! One running agent instance

use super::LogBuffer;
use crate::completion::{CompletionClient, CompletionRequest, StreamEvent};
use crate::error::{AgentError, Error, ErrorKind, Result, StorageError};
use crate::session::SessionBridge;
use crate::types::*;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// A worker bound to one agent definition and one model.
///
/// Message processing is serialized: one call generates at a time, up to
/// `message_queue_depth` further callers wait in FIFO order, and anything
/// beyond that is rejected with `Busy`.
pub struct AgentWorker {
    config: WorkerConfig,
    system_prompt: String,
    tools: ToolSet,
    bridge: SessionBridge,
    completion: Arc<dyn CompletionClient>,
    status: RwLock<WorkerStatus>,
    logs: Mutex<LogBuffer>,
    active_sessions: Mutex<HashSet<String>>,
    /// Replaced on every `start()`
    cancel: Mutex<CancellationToken>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    turn_lock: tokio::sync::Mutex<()>,
    /// In-flight plus queued `process_message` calls
    pending: AtomicUsize,
}

/// Releases a `pending` slot when a call leaves `process_message`
struct PendingSlot<'a>(&'a AtomicUsize);

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AgentWorker {
    pub fn new(
        definition: &AgentDefinition,
        config: WorkerConfig,
        bridge: SessionBridge,
        completion: Arc<dyn CompletionClient>,
    ) -> Arc<Self> {
        let (tools, unknown) = ToolSet::resolve(&definition.allowed_tools);
        let logs = LogBuffer::new(config.log_capacity, config.log_level);

        let worker = Arc::new(Self {
            system_prompt: definition.system_prompt.clone(),
            tools,
            bridge,
            completion,
            status: RwLock::new(WorkerStatus::new(config.clone())),
            logs: Mutex::new(logs),
            active_sessions: Mutex::new(HashSet::new()),
            cancel: Mutex::new(CancellationToken::new()),
            heartbeat: Mutex::new(None),
            turn_lock: tokio::sync::Mutex::new(()),
            pending: AtomicUsize::new(0),
            config,
        });

        if !unknown.is_empty() {
            worker.log(
                LogLevel::Warn,
                "Ignoring unknown tools in agent definition",
                Some(serde_json::json!({ "tools": unknown })),
            );
        }

        worker
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn agent_id(&self) -> &str {
        &self.config.agent_id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn state(&self) -> WorkerState {
        self.status.read().state
    }

    /// Point-in-time copy of the worker status
    pub fn status(&self) -> WorkerStatus {
        self.status.read().snapshot_at(chrono::Utc::now())
    }

    /// Most recent log entries, oldest first
    pub fn logs(&self, limit: Option<usize>) -> Vec<LogEntry> {
        self.logs.lock().recent(limit)
    }

    /// Start the worker and its heartbeat
    pub fn start(self: &Arc<Self>) -> Result<WorkerStatus> {
        let token = {
            let mut status = self.status.write();
            if status.state.is_live() {
                return Err(AgentError::AlreadyRunning(self.config.agent_id.clone()).into());
            }

            let token = CancellationToken::new();
            *self.cancel.lock() = token.clone();

            let now = chrono::Utc::now();
            status.state = WorkerState::Running;
            status.started_at = Some(now);
            status.stopped_at = None;
            status.last_activity = Some(now);
            status.current_session_id = None;
            status.active_session_count = 0;
            token
        };
        self.active_sessions.lock().clear();

        let period = Duration::from_millis(self.config.heartbeat_interval_ms);
        let handle = tokio::spawn(heartbeat_loop(Arc::downgrade(self), token, period));
        if let Some(previous) = self.heartbeat.lock().replace(handle) {
            previous.abort();
        }

        self.log(
            LogLevel::Info,
            "Worker started",
            Some(serde_json::json!({ "modelId": self.config.model_id })),
        );
        Ok(self.status())
    }

    /// Request cancellation of in-flight work and mark the worker stopped.
    ///
    /// Returns once cancellation has been requested and the heartbeat has
    /// exited; an in-flight `process_message` unwinds on its own.
    pub async fn stop(&self) -> Result<WorkerStatus> {
        let handle = {
            let mut status = self.status.write();
            self.cancel.lock().cancel();

            if status.state == WorkerState::Stopped {
                debug!(agent_id = %self.config.agent_id, "Worker already stopped");
            } else {
                status.state = WorkerState::Stopped;
                status.stopped_at = Some(chrono::Utc::now());
                status.current_session_id = None;
            }
            self.heartbeat.lock().take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    let message = format!("heartbeat task panicked: {}", e);
                    self.record_failure(&message);
                    return Err(AgentError::StopFailed {
                        agent_id: self.config.agent_id.clone(),
                        message,
                    }
                    .into());
                }
            }
        }

        self.log(LogLevel::Info, "Worker stopped", None);
        Ok(self.status())
    }

    /// Run one user message through the agent and return the session's
    /// full ordered turn list.
    pub async fn process_message(
        &self,
        input: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<Turn>> {
        let agent_id = &self.config.agent_id;
        if !self.state().is_live() {
            return Err(AgentError::NotRunning(agent_id.clone()).into());
        }
        let token = self.cancel.lock().clone();

        let queued = self.pending.fetch_add(1, Ordering::SeqCst);
        let _slot = PendingSlot(&self.pending);
        if queued > self.config.message_queue_depth {
            self.log(LogLevel::Debug, "Rejected message: worker busy", None);
            return Err(AgentError::Busy(agent_id.clone()).into());
        }

        let _turn = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AgentError::Aborted(agent_id.clone()).into()),
            guard = self.turn_lock.lock() => guard,
        };
        if token.is_cancelled() {
            return Err(AgentError::Aborted(agent_id.clone()).into());
        }

        let result = self.run_turn(input, session_id, &token).await;
        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::Aborted => self.log(LogLevel::Info, "Generation aborted", None),
                _ => self.record_failure(&e.to_string()),
            }
        }
        result
    }

    async fn run_turn(
        &self,
        input: &str,
        session_id: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Vec<Turn>> {
        let session_id = match session_id {
            Some(id) => {
                let known = self
                    .bridge
                    .get_session(id)
                    .await
                    .map_err(|e| self.session_failure(id, e))?;
                if known.is_none() {
                    return Err(self.session_not_found(id));
                }
                id.to_string()
            }
            None => {
                let id = self
                    .bridge
                    .create_session(&self.config.agent_id, &self.config.model_id, &self.system_prompt)
                    .await
                    .map_err(|e| self.session_failure("", e))?;
                self.status.write().total_sessions += 1;
                self.log(
                    LogLevel::Info,
                    "Created session",
                    Some(serde_json::json!({ "sessionId": id })),
                );
                id
            }
        };
        self.track_session(&session_id);

        self.bridge
            .append_turn(&session_id, Turn::user(input))
            .await
            .map_err(|e| self.session_failure(&session_id, e))?;

        let history = self
            .bridge
            .turns(&session_id)
            .await
            .map_err(|e| self.session_failure(&session_id, e))?
            .ok_or_else(|| self.session_not_found(&session_id))?;

        let reply = self.generate(history, token).await?;
        if token.is_cancelled() {
            return Err(AgentError::Aborted(self.config.agent_id.clone()).into());
        }

        self.bridge
            .append_turn(&session_id, reply)
            .await
            .map_err(|e| self.session_failure(&session_id, e))?;

        {
            let mut status = self.status.write();
            status.messages_processed += 1;
            status.last_activity = Some(chrono::Utc::now());
            if status.state == WorkerState::Error {
                status.state = WorkerState::Running;
                status.current_session_id = Some(session_id.clone());
            }
        }

        self.bridge
            .turns(&session_id)
            .await
            .map_err(|e| self.session_failure(&session_id, e))?
            .ok_or_else(|| self.session_not_found(&session_id))
    }

    /// Consume one completion stream into an assistant turn
    async fn generate(&self, history: Vec<Turn>, token: &CancellationToken) -> Result<Turn> {
        let request = CompletionRequest {
            agent_id: self.config.agent_id.clone(),
            model_id: self.config.model_id.clone(),
            system_prompt: self.system_prompt.clone(),
            history,
            tools: self.tools.clone(),
        };

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AgentError::Aborted(self.config.agent_id.clone()).into()),
            opened = self.completion.stream(request) => opened.map_err(|e| self.generation_failed(e))?,
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut stop_reason = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(AgentError::Aborted(self.config.agent_id.clone()).into()),
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Err(e)) => return Err(self.generation_failed(e)),
                Some(Ok(StreamEvent::TextDelta(delta))) => {
                    trace!(agent_id = %self.config.agent_id, "text delta: {} bytes", delta.len());
                    text.push_str(&delta);
                }
                Some(Ok(StreamEvent::ToolUse { id, name, input })) => {
                    if self.tools.allows(&name) {
                        self.status.write().tools_executed += 1;
                        self.log(
                            LogLevel::Debug,
                            "Tool use requested",
                            Some(serde_json::json!({ "toolCallId": id, "tool": name })),
                        );
                        tool_calls.push(ToolCallRecord { id, name, input });
                    } else {
                        self.log(
                            LogLevel::Warn,
                            "Ignoring tool use outside the allowed set",
                            Some(serde_json::json!({ "toolCallId": id, "tool": name })),
                        );
                    }
                }
                Some(Ok(StreamEvent::Stop(reason))) => {
                    stop_reason = Some(reason);
                    break;
                }
            }
        }

        if stop_reason.is_none() {
            self.log(LogLevel::Warn, "Completion stream ended without a stop reason", None);
        }

        Ok(Turn::assistant(text, tool_calls, stop_reason))
    }

    fn track_session(&self, session_id: &str) {
        let active = {
            let mut sessions = self.active_sessions.lock();
            sessions.insert(session_id.to_string());
            sessions.len()
        };

        {
            let mut status = self.status.write();
            // Only a running worker exposes a current session.
            if status.state == WorkerState::Running {
                status.current_session_id = Some(session_id.to_string());
            }
            status.active_session_count = active;
        }

        if active > self.config.max_concurrent_sessions as usize {
            self.log(
                LogLevel::Warn,
                "Active sessions exceed the configured maximum",
                Some(serde_json::json!({
                    "active": active,
                    "max": self.config.max_concurrent_sessions,
                })),
            );
        }
    }

    fn on_heartbeat(&self, probe: Result<()>) {
        match probe {
            Ok(()) => {
                let mut status = self.status.write();
                if status.state.is_live() {
                    status.last_activity = Some(chrono::Utc::now());
                }
            }
            Err(e) => {
                let message = format!("heartbeat probe failed: {}", e);
                self.record_failure(&message);
                let mut status = self.status.write();
                if status.state == WorkerState::Running {
                    status.state = WorkerState::Error;
                    status.current_session_id = None;
                }
            }
        }
    }

    fn record_failure(&self, message: &str) {
        {
            let mut status = self.status.write();
            status.error_count += 1;
            status.last_error = Some(message.to_string());
        }
        self.log(LogLevel::Error, message, None);
    }

    fn generation_failed(&self, err: Error) -> Error {
        AgentError::GenerationFailed {
            agent_id: self.config.agent_id.clone(),
            message: err.to_string(),
        }
        .into()
    }

    fn session_not_found(&self, session_id: &str) -> Error {
        AgentError::SessionNotFound {
            agent_id: self.config.agent_id.clone(),
            session_id: session_id.to_string(),
        }
        .into()
    }

    fn session_failure(&self, session_id: &str, err: Error) -> Error {
        match err {
            Error::Storage(StorageError::NotFound(_)) => self.session_not_found(session_id),
            Error::Agent(_) => err,
            other => AgentError::SessionStoreFailed {
                agent_id: self.config.agent_id.clone(),
                message: other.to_string(),
            }
            .into(),
        }
    }

    fn log(&self, level: LogLevel, message: &str, context: Option<serde_json::Value>) {
        let agent_id = &self.config.agent_id;
        let worker_id = &self.config.id;
        match level {
            LogLevel::Trace => trace!(%agent_id, %worker_id, "{}", message),
            LogLevel::Debug => debug!(%agent_id, %worker_id, "{}", message),
            LogLevel::Info => info!(%agent_id, %worker_id, "{}", message),
            LogLevel::Warn => warn!(%agent_id, %worker_id, "{}", message),
            LogLevel::Error => error!(%agent_id, %worker_id, "{}", message),
        }
        self.logs.lock().push(level, message, context);
    }
}

/// Periodic liveness probe; exits when the start token is cancelled or the
/// worker is dropped.
async fn heartbeat_loop(worker: Weak<AgentWorker>, token: CancellationToken, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let Some(worker) = worker.upgrade() else {
            break;
        };
        let probe = tokio::select! {
            _ = token.cancelled() => break,
            probe = worker.completion.health_check() => probe,
        };
        if token.is_cancelled() {
            break;
        }
        worker.on_heartbeat(probe);
    }
}
