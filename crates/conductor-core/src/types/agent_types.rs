//! Agent definition and worker configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Agent definition as served by the catalog. Read-only to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    /// Tool names as written in the definition; resolved into a [`ToolSet`]
    /// when a worker is built.
    pub allowed_tools: Vec<String>,
}

impl AgentDefinition {
    /// Create a new agent definition with no tools
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            system_prompt: system_prompt.into(),
            allowed_tools: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Built-in software engineering agent
    pub fn software_agent() -> Self {
        Self::new(
            "softwareAgent",
            "Software Agent",
            "You are a careful software engineer. Read the code before changing it, \
             keep edits minimal, and explain what you changed.",
        )
        .with_description("Reads, edits and runs code in the workspace")
        .with_tools([
            "read_file",
            "write_file",
            "edit_file",
            "list_directory",
            "search_files",
            "execute_command",
        ])
    }

    /// Built-in research agent
    pub fn research_agent() -> Self {
        Self::new(
            "researchAgent",
            "Research Agent",
            "You are a research assistant. Cite your sources and say when you are unsure.",
        )
        .with_description("Searches and summarizes the web")
        .with_tools(["web_search", "web_fetch", "read_file"])
    }

    /// Built-in vision agent
    pub fn vision_agent() -> Self {
        Self::new(
            "visionAgent",
            "Vision Agent",
            "You describe what the camera sees, precisely and briefly.",
        )
        .with_description("Captures and describes camera frames")
        .with_tools(["camera_capture"])
    }

    /// Get all built-in agents
    pub fn builtin_agents() -> Vec<Self> {
        vec![
            Self::software_agent(),
            Self::research_agent(),
            Self::vision_agent(),
        ]
    }
}

/// Closed set of tools a worker may expose to the completion service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    ReadFile,
    WriteFile,
    EditFile,
    ListDirectory,
    SearchFiles,
    ExecuteCommand,
    WebSearch,
    WebFetch,
    CameraCapture,
}

impl ToolId {
    pub const ALL: [ToolId; 9] = [
        ToolId::ReadFile,
        ToolId::WriteFile,
        ToolId::EditFile,
        ToolId::ListDirectory,
        ToolId::SearchFiles,
        ToolId::ExecuteCommand,
        ToolId::WebSearch,
        ToolId::WebFetch,
        ToolId::CameraCapture,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolId::ReadFile => "read_file",
            ToolId::WriteFile => "write_file",
            ToolId::EditFile => "edit_file",
            ToolId::ListDirectory => "list_directory",
            ToolId::SearchFiles => "search_files",
            ToolId::ExecuteCommand => "execute_command",
            ToolId::WebSearch => "web_search",
            ToolId::WebFetch => "web_fetch",
            ToolId::CameraCapture => "camera_capture",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolId::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| format!("unknown tool: {}", s))
    }
}

/// Tools resolved for one worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSet(BTreeSet<ToolId>);

impl ToolSet {
    /// Resolve tool names, splitting out the names that are not known tools.
    pub fn resolve<S: AsRef<str>>(names: &[S]) -> (Self, Vec<String>) {
        let mut tools = BTreeSet::new();
        let mut unknown = Vec::new();

        for name in names {
            match name.as_ref().parse::<ToolId>() {
                Ok(tool) => {
                    tools.insert(tool);
                }
                Err(_) => unknown.push(name.as_ref().to_string()),
            }
        }

        (Self(tools), unknown)
    }

    pub fn contains(&self, tool: ToolId) -> bool {
        self.0.contains(&tool)
    }

    /// Whether a tool name reported by the completion service is allowed
    pub fn allows(&self, name: &str) -> bool {
        name.parse::<ToolId>()
            .map(|tool| self.contains(tool))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = ToolId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ToolId> for ToolSet {
    fn from_iter<I: IntoIterator<Item = ToolId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Level used to filter a worker's log ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Immutable configuration of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    pub id: String,
    pub agent_id: String,
    pub model_id: String,
    pub auto_start: bool,
    /// Advisory only; exceeding it is logged, never enforced.
    pub max_concurrent_sessions: u32,
    pub log_level: LogLevel,
    /// Callers allowed to wait behind an in-flight message. Zero rejects with `Busy`.
    pub message_queue_depth: usize,
    pub heartbeat_interval_ms: u64,
    pub log_capacity: usize,
}

/// Per-start overrides; unset fields fall back to the runtime settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerOptions {
    pub auto_start: Option<bool>,
    pub max_concurrent_sessions: Option<u32>,
    pub log_level: Option<LogLevel>,
    pub message_queue_depth: Option<usize>,
    pub heartbeat_interval_ms: Option<u64>,
    pub log_capacity: Option<usize>,
}
