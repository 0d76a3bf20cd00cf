//! Agent orchestrator

use crate::catalog::AgentCatalog;
use crate::completion::CompletionClient;
use crate::config::RuntimeSettings;
use crate::error::{AgentError, Result};
use crate::session::SessionBridge;
use crate::types::*;
use crate::worker::AgentWorker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Parameters of `start_agent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAgentRequest {
    pub agent_id: String,
    pub model_id: String,
    #[serde(default)]
    pub config: Option<WorkerOptions>,
}

impl StartAgentRequest {
    pub fn new(agent_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model_id: model_id.into(),
            config: None,
        }
    }

    pub fn with_options(mut self, options: WorkerOptions) -> Self {
        self.config = Some(options);
        self
    }
}

/// Registry of live workers, at most one per agent id.
///
/// Construct one per process and share it by reference. Registry
/// mutations happen under a single lock together with the "already
/// running" check, so concurrent starts of one agent cannot both succeed.
pub struct AgentOrchestrator {
    catalog: Arc<dyn AgentCatalog>,
    bridge: SessionBridge,
    completion: Arc<dyn CompletionClient>,
    settings: RuntimeSettings,
    workers: Mutex<HashMap<String, Arc<AgentWorker>>>,
}

impl AgentOrchestrator {
    pub fn new(
        catalog: Arc<dyn AgentCatalog>,
        bridge: SessionBridge,
        completion: Arc<dyn CompletionClient>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            catalog,
            bridge,
            completion,
            settings,
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Start a fresh worker for an agent
    pub async fn start_agent(&self, request: StartAgentRequest) -> Result<WorkerStatus> {
        let agent_id = request.agent_id;
        let definition = self
            .catalog
            .get(&agent_id)
            .ok_or_else(|| AgentError::NotInCatalog(agent_id.clone()))?;

        let mut workers = self.workers.lock().await;

        if let Some(existing) = workers.get(&agent_id) {
            if existing.state() == WorkerState::Running {
                return Err(AgentError::AlreadyRunning(agent_id).into());
            }
        }

        // A stale instance (error state) is discarded, not reused. It is
        // stopped after the registry lock is released.
        let previous = workers.remove(&agent_id);

        let options = request.config.unwrap_or_default();
        let config = self
            .settings
            .worker_config(&agent_id, &request.model_id, &options);

        info!(
            "Starting agent: {} ({}) on model {}",
            definition.name, agent_id, request.model_id
        );

        let worker = AgentWorker::new(
            &definition,
            config,
            self.bridge.clone(),
            Arc::clone(&self.completion),
        );
        let started = worker.start();
        if started.is_ok() {
            workers.insert(agent_id.clone(), worker);
        }
        drop(workers);

        if let Some(previous) = previous {
            if let Err(e) = previous.stop().await {
                warn!("Error stopping previous worker for {}: {}", agent_id, e);
            }
        }

        started
    }

    /// Stop an agent's worker and free its registry slot
    pub async fn stop_agent(&self, agent_id: &str) -> Result<WorkerStatus> {
        let worker = self
            .workers
            .lock()
            .await
            .remove(agent_id)
            .ok_or_else(|| AgentError::NotRegistered(agent_id.to_string()))?;

        info!("Stopping agent: {}", agent_id);
        worker.stop().await
    }

    /// Stop then start an agent on the default model.
    ///
    /// A failed stop is returned as-is and no start is attempted.
    pub async fn restart_agent(&self, agent_id: &str) -> Result<WorkerStatus> {
        self.stop_agent(agent_id).await?;
        self.start_agent(StartAgentRequest::new(
            agent_id,
            self.settings.default_model_id.clone(),
        ))
        .await
    }

    /// Status snapshot of one agent's worker
    pub async fn get_agent_status(&self, agent_id: &str) -> Option<WorkerStatus> {
        let worker = self.workers.lock().await.get(agent_id).cloned();
        worker.map(|w| w.status())
    }

    /// Status snapshots of every registered worker, in no particular order
    pub async fn get_all_agent_statuses(&self) -> Vec<WorkerStatus> {
        let workers: Vec<Arc<AgentWorker>> =
            self.workers.lock().await.values().cloned().collect();
        workers.iter().map(|w| w.status()).collect()
    }

    /// Recent diagnostic log entries of one agent's worker, oldest first
    pub async fn get_agent_logs(
        &self,
        agent_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LogEntry>> {
        Ok(self.worker(agent_id).await?.logs(limit))
    }

    /// Ids of agents whose worker is currently running
    pub async fn running_agent_ids(&self) -> Vec<String> {
        self.workers
            .lock()
            .await
            .iter()
            .filter(|(_, w)| w.state() == WorkerState::Running)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Route a message to the agent's worker
    pub async fn process_message(
        &self,
        agent_id: &str,
        input: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<Turn>> {
        let worker = self.worker(agent_id).await?;
        worker.process_message(input, session_id).await
    }

    /// Start every agent listed in the settings' autostart list.
    ///
    /// Failures are reported per agent and do not prevent later starts.
    pub async fn start_autostart_agents(&self) -> Vec<(String, Result<WorkerStatus>)> {
        let mut results = Vec::with_capacity(self.settings.autostart.len());

        for entry in &self.settings.autostart {
            let model_id = entry
                .model_id
                .clone()
                .unwrap_or_else(|| self.settings.default_model_id.clone());
            let request = StartAgentRequest::new(&entry.agent_id, model_id).with_options(
                WorkerOptions {
                    auto_start: Some(true),
                    ..Default::default()
                },
            );

            let result = self.start_agent(request).await;
            if let Err(e) = &result {
                error!("Autostart failed for {}: {}", entry.agent_id, e);
            }
            results.push((entry.agent_id.clone(), result));
        }

        results
    }

    /// Stop every worker concurrently and clear the registry
    pub async fn shutdown(&self) -> ShutdownReport {
        let workers: Vec<(String, Arc<AgentWorker>)> =
            self.workers.lock().await.drain().collect();

        info!("Shutting down {} agent(s)", workers.len());

        let outcomes = futures::future::join_all(workers.into_iter().map(
            |(agent_id, worker)| async move {
                let result = worker.stop().await;
                (agent_id, result)
            },
        ))
        .await;

        let mut report = ShutdownReport::default();
        for (agent_id, result) in outcomes {
            match result {
                Ok(_) => report.stopped.push(agent_id),
                Err(e) => {
                    error!("Error stopping agent {}: {}", agent_id, e);
                    report.failed.push((agent_id, e.to_string()));
                }
            }
        }

        info!(
            "Shutdown complete: {} stopped, {} failed",
            report.succeeded(),
            report.failed.len()
        );
        report
    }

    async fn worker(&self, agent_id: &str) -> Result<Arc<AgentWorker>> {
        self.workers
            .lock()
            .await
            .get(agent_id)
            .cloned()
            .ok_or_else(|| AgentError::NotRegistered(agent_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockAgentCatalog, StaticCatalog};
    use crate::completion::testing::ScriptedClient;
    use crate::config::AutoStartAgent;
    use crate::error::ErrorKind;
    use crate::session::{MemorySessionStore, SessionStore, SqliteSessionStore};
    use crate::storage::Storage;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn orchestrator_with(client: Arc<ScriptedClient>, settings: RuntimeSettings) -> AgentOrchestrator {
        AgentOrchestrator::new(
            Arc::new(StaticCatalog::builtin()),
            SessionBridge::new(Arc::new(MemorySessionStore::new())),
            client,
            settings,
        )
    }

    fn orchestrator(client: Arc<ScriptedClient>) -> AgentOrchestrator {
        orchestrator_with(client, RuntimeSettings::default())
    }

    #[tokio::test]
    async fn test_happy_path_conversation() {
        let orch = orchestrator(Arc::new(ScriptedClient::replying("Hi, how can I help?")));

        let status = orch
            .start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap();
        assert_eq!(status.state, WorkerState::Running);
        assert_eq!(status.total_sessions, 0);

        let turns = orch
            .process_message("softwareAgent", "Hello", None)
            .await
            .unwrap();
        assert_eq!(turns.len(), 2);

        let status = orch.get_agent_status("softwareAgent").await.unwrap();
        assert_eq!(status.messages_processed, 1);
        assert_eq!(status.total_sessions, 1);
        let session_id = status.current_session_id.unwrap();

        let turns = orch
            .process_message("softwareAgent", "Follow-up", Some(&session_id))
            .await
            .unwrap();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["Hello", "Hi, how can I help?", "Follow-up", "Hi, how can I help?"]
        );

        let status = orch.get_agent_status("softwareAgent").await.unwrap();
        assert_eq!(status.messages_processed, 2);
        assert_eq!(status.total_sessions, 1);
    }

    #[tokio::test]
    async fn test_unknown_agent_leaves_registry_empty() {
        let mut catalog = MockAgentCatalog::new();
        catalog.expect_get().times(1).returning(|_| None);

        let orch = AgentOrchestrator::new(
            Arc::new(catalog),
            SessionBridge::new(Arc::new(MemorySessionStore::new())),
            Arc::new(ScriptedClient::replying("hi")),
            RuntimeSettings::default(),
        );

        let err = orch
            .start_agent(StartAgentRequest::new("ghost", "m1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentNotFound);
        assert_eq!(err.agent_id(), Some("ghost"));
        assert!(orch.get_all_agent_statuses().await.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_definition_reaches_worker() {
        let mut catalog = MockAgentCatalog::new();
        catalog.expect_get().returning(|id| {
            Some(AgentDefinition::new(id, "Mocked", "Mocked prompt").with_tools(["web_search"]))
        });
        let client = Arc::new(ScriptedClient::replying("ok"));

        let orch = AgentOrchestrator::new(
            Arc::new(catalog),
            SessionBridge::new(Arc::new(MemorySessionStore::new())),
            client.clone(),
            RuntimeSettings::default(),
        );
        assert_ok!(orch.start_agent(StartAgentRequest::new("mocked", "m1")).await);
        assert_ok!(orch.process_message("mocked", "Hello", None).await);

        let request = &client.requests()[0];
        assert_eq!(request.system_prompt, "Mocked prompt");
        assert!(request.tools.contains(ToolId::WebSearch));
        assert_eq!(request.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let orch = orchestrator(Arc::new(ScriptedClient::replying("hi")));

        assert_ok!(orch.start_agent(StartAgentRequest::new("softwareAgent", "m1")).await);
        let err = orch
            .start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyRunning);
        assert_eq!(orch.get_all_agent_statuses().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_yield_one_winner() {
        let orch = Arc::new(orchestrator(Arc::new(ScriptedClient::replying("hi"))));

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let orch = Arc::clone(&orch);
                tokio::spawn(async move {
                    orch.start_agent(StartAgentRequest::new("softwareAgent", "m1"))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        let mut rejected = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => {
                    assert_eq!(e.kind(), ErrorKind::AlreadyRunning);
                    rejected += 1;
                }
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(rejected, 7);
    }

    #[tokio::test]
    async fn test_stop_removes_worker() {
        let orch = orchestrator(Arc::new(ScriptedClient::replying("hi")));
        orch.start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap();

        let status = orch.stop_agent("softwareAgent").await.unwrap();
        assert_eq!(status.state, WorkerState::Stopped);

        assert!(orch.get_agent_status("softwareAgent").await.is_none());
        let err = orch
            .process_message("softwareAgent", "Hello", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // The slot is free again
        assert_ok!(orch.start_agent(StartAgentRequest::new("softwareAgent", "m1")).await);
    }

    #[tokio::test]
    async fn test_stop_unknown_agent() {
        let orch = orchestrator(Arc::new(ScriptedClient::replying("hi")));
        let err = orch.stop_agent("softwareAgent").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_stop_agent_aborts_in_flight_message() {
        let client = Arc::new(ScriptedClient::hanging());
        let orch = Arc::new(orchestrator(client.clone()));
        orch.start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap();

        let in_flight = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.process_message("softwareAgent", "Hello", None).await })
        };
        client.opened.notified().await;

        let status = orch.stop_agent("softwareAgent").await.unwrap();
        assert_eq!(status.state, WorkerState::Stopped);
        assert_eq!(in_flight.await.unwrap().unwrap_err().kind(), ErrorKind::Aborted);
    }

    #[tokio::test]
    async fn test_restart_builds_fresh_worker_on_default_model() {
        let settings = RuntimeSettings {
            default_model_id: "default-model".into(),
            ..Default::default()
        };
        let orch = orchestrator_with(Arc::new(ScriptedClient::replying("hi")), settings);

        let first = orch
            .start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap();
        orch.process_message("softwareAgent", "Hello", None)
            .await
            .unwrap();

        let restarted = orch.restart_agent("softwareAgent").await.unwrap();
        assert_eq!(restarted.state, WorkerState::Running);
        assert_ne!(restarted.worker_id, first.worker_id);
        assert_eq!(restarted.config.model_id, "default-model");
        assert_eq!(restarted.messages_processed, 0);
        assert_eq!(restarted.total_sessions, 0);
    }

    #[tokio::test]
    async fn test_restart_of_unregistered_agent_does_not_start() {
        let orch = orchestrator(Arc::new(ScriptedClient::replying("hi")));

        let err = orch.restart_agent("softwareAgent").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(orch.get_all_agent_statuses().await.is_empty());
    }

    #[tokio::test]
    async fn test_errored_worker_is_replaced_on_start() {
        let client = Arc::new(ScriptedClient::replying("hi"));
        client.set_unhealthy(true);
        let orch = orchestrator(client.clone());

        let options = WorkerOptions {
            heartbeat_interval_ms: Some(10),
            ..Default::default()
        };
        let first = orch
            .start_agent(StartAgentRequest::new("softwareAgent", "m1").with_options(options))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let status = orch.get_agent_status("softwareAgent").await.unwrap();
                if status.state == WorkerState::Error {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(orch.running_agent_ids().await.is_empty());

        client.set_unhealthy(false);
        let second = orch
            .start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap();
        assert_ne!(second.worker_id, first.worker_id);
        assert_eq!(second.error_count, 0);
        assert_eq!(orch.running_agent_ids().await, vec!["softwareAgent".to_string()]);
    }

    #[tokio::test]
    async fn test_replacement_survives_failing_stop_of_errored_worker() {
        let client = Arc::new(ScriptedClient::replying("hi"));
        client.set_unhealthy(true);
        let orch = orchestrator(client.clone());

        let options = WorkerOptions {
            heartbeat_interval_ms: Some(5),
            ..Default::default()
        };
        let first = orch
            .start_agent(StartAgentRequest::new("softwareAgent", "m1").with_options(options))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while orch.get_agent_status("softwareAgent").await.unwrap().state != WorkerState::Error {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // The errored worker's heartbeat dies, so stopping it will fail.
        client.set_panic_on_probe(true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.set_panic_on_probe(false);
        client.set_unhealthy(false);

        let second = orch
            .start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap();
        assert_ne!(second.worker_id, first.worker_id);

        let status = orch.get_agent_status("softwareAgent").await.unwrap();
        assert_eq!(status.worker_id, second.worker_id);
        assert_eq!(status.state, WorkerState::Running);
        assert_ok!(orch.process_message("softwareAgent", "Hello", None).await);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let orch = orchestrator(Arc::new(ScriptedClient::replying("hi")));
        for agent_id in ["softwareAgent", "researchAgent", "visionAgent"] {
            orch.start_agent(StartAgentRequest::new(agent_id, "m1"))
                .await
                .unwrap();
        }

        let report = orch.shutdown().await;
        assert_eq!(report.succeeded(), 3);
        assert!(report.is_clean());
        assert!(orch.get_all_agent_statuses().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_reports_failed_stops_and_still_clears() {
        let client = Arc::new(ScriptedClient::replying("hi"));
        let orch = orchestrator(client.clone());

        orch.start_agent(StartAgentRequest::new("researchAgent", "m1"))
            .await
            .unwrap();
        client.set_panic_on_probe(true);
        orch.start_agent(
            StartAgentRequest::new("softwareAgent", "m1").with_options(WorkerOptions {
                heartbeat_interval_ms: Some(5),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = orch.shutdown().await;
        assert_eq!(report.stopped, vec!["researchAgent".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "softwareAgent");
        assert!(orch.get_all_agent_statuses().await.is_empty());
    }

    #[tokio::test]
    async fn test_agent_logs() {
        let orch = orchestrator(Arc::new(ScriptedClient::replying("hi")));
        orch.start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap();
        orch.process_message("softwareAgent", "Hello", None)
            .await
            .unwrap();

        let logs = orch.get_agent_logs("softwareAgent", None).await.unwrap();
        let messages: Vec<&str> = logs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["Worker started", "Created session"]);

        let latest = orch.get_agent_logs("softwareAgent", Some(1)).await.unwrap();
        assert_eq!(latest[0].message, "Created session");

        let err = orch.get_agent_logs("ghost", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_autostart_reports_each_agent() {
        let settings = RuntimeSettings {
            autostart: vec![
                AutoStartAgent {
                    agent_id: "softwareAgent".into(),
                    model_id: None,
                },
                AutoStartAgent {
                    agent_id: "ghost".into(),
                    model_id: None,
                },
                AutoStartAgent {
                    agent_id: "researchAgent".into(),
                    model_id: Some("m2".into()),
                },
            ],
            ..Default::default()
        };
        let orch = orchestrator_with(Arc::new(ScriptedClient::replying("hi")), settings);

        let results = orch.start_autostart_agents().await;
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].1.as_ref().unwrap_err().kind(), ErrorKind::AgentNotFound);

        let research = results[2].1.as_ref().unwrap();
        assert_eq!(research.config.model_id, "m2");
        assert!(research.config.auto_start);

        let software = orch.get_agent_status("softwareAgent").await.unwrap();
        assert_eq!(software.config.model_id, RuntimeSettings::default().default_model_id);
    }

    #[tokio::test]
    async fn test_conversation_persists_through_sqlite() {
        let storage = Arc::new(Storage::in_memory().unwrap());
        let store = Arc::new(SqliteSessionStore::new(Arc::clone(&storage)));
        let orch = AgentOrchestrator::new(
            Arc::new(StaticCatalog::builtin()),
            SessionBridge::new(store.clone()),
            Arc::new(ScriptedClient::replying("persisted")),
            RuntimeSettings::default(),
        );

        orch.start_agent(StartAgentRequest::new("softwareAgent", "m1"))
            .await
            .unwrap();
        let turns = orch
            .process_message("softwareAgent", "Hello", None)
            .await
            .unwrap();
        assert_eq!(turns.len(), 2);

        let sessions = store.list_for_agent("softwareAgent").await.unwrap();
        assert_eq!(sessions.len(), 1);
        let session = store.get(&sessions[0]).await.unwrap().unwrap();
        assert_eq!(session.turns, turns);
        assert_eq!(session.model_id, "m1");

        orch.shutdown().await;
    }
}
