//! Agent catalog
//!
//! Read-only lookup of agent definitions by id. The runtime resolves a
//! definition once per start and never mutates it.

use crate::types::AgentDefinition;
use std::collections::HashMap;
use tracing::info;

/// Source of agent definitions
#[cfg_attr(test, mockall::automock)]
pub trait AgentCatalog: Send + Sync {
    /// Look up one agent definition
    fn get(&self, agent_id: &str) -> Option<AgentDefinition>;

    /// List every known definition
    fn list(&self) -> Vec<AgentDefinition>;
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    agents: HashMap<String, AgentDefinition>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the built-in agents
    pub fn builtin() -> Self {
        Self::from_definitions(AgentDefinition::builtin_agents())
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = AgentDefinition>) -> Self {
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.insert(definition);
        }
        catalog
    }

    /// Add or replace a definition
    pub fn insert(&mut self, definition: AgentDefinition) {
        info!("Registering agent definition: {} ({})", definition.name, definition.id);
        self.agents.insert(definition.id.clone(), definition);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl AgentCatalog for StaticCatalog {
    fn get(&self, agent_id: &str) -> Option<AgentDefinition> {
        self.agents.get(agent_id).cloned()
    }

    fn list(&self) -> Vec<AgentDefinition> {
        let mut agents: Vec<_> = self.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }
}
