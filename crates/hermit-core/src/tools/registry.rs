//! Tool trait, registry, and per-agent tool sets.
//!
//! The registry is assembled once before any session starts and is
//! read-only from then on. Each agent sees a [`ToolSet`]: an ordered
//! subset of the registry plus its session-scoped tools.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::ai::types::{Message, ToolSchema};

/// Default tool execution timeout (2 minutes).
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of one tool invocation. Produced only by tool execution, never
/// by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(content.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
        }
    }

    /// Fold this result into the transcript as a tool-role message.
    /// Failures surface as ordinary content the model can react to.
    pub fn into_message(self, tool_call_id: impl Into<String>) -> Message {
        let content = if self.success {
            self.content.unwrap_or_default()
        } else {
            format!("Error: {}", self.error.unwrap_or_else(|| "unknown".into()))
        };
        Message::tool(tool_call_id, content)
    }
}

/// Parse tool parameters, turning a mismatch into a recoverable failure.
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params)
        .map_err(|e| ToolResult::failure(format!("Invalid parameters: {e}")))
}

/// Context handed to every tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub workspace_dir: PathBuf,
    /// Optional per-call timeout override.
    pub timeout: Option<Duration>,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            workspace_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
        }
    }
}

impl ToolContext {
    pub fn new(workspace_dir: PathBuf) -> Self {
        Self {
            workspace_dir,
            timeout: None,
        }
    }
}

/// Trait for tool implementations.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id).
    fn name(&self) -> &str;

    /// Tool description for the model.
    fn description(&self) -> &str;

    /// JSON schema for parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

/// Global catalog of tools, frozen before sessions start.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A duplicate name replaces the earlier entry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if let Some(&index) = self.by_name.get(&name) {
            warn!(tool = %name, "replacing previously registered tool");
            self.tools[index] = tool;
        } else {
            self.by_name.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| self.tools[i].clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Ordered subset of the registry. `allowed = None` means every
    /// registered tool. Unknown names in the filter are ignored.
    pub fn tool_set(&self, allowed: Option<&[String]>) -> ToolSet {
        let tools = self
            .tools
            .iter()
            .filter(|tool| {
                allowed.is_none_or(|names| names.iter().any(|n| n == tool.name()))
            })
            .cloned()
            .collect();
        ToolSet::new(tools)
    }
}

/// One agent's effective, ordered tool collection.
#[derive(Clone)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
    default_timeout: Duration,
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ToolSet {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            tools,
            default_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Append a session-scoped tool.
    pub fn push(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Keep only tools whose name passes the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.tools.retain(|tool| keep(tool.name()));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Schemas to advertise with the next model call.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) struct EchoTool {
        name: &'static str,
    }

    impl EchoTool {
        pub fn named(name: &'static str) -> Arc<dyn Tool> {
            Arc::new(Self { name })
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "additionalProperties": false})
        }

        async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::success(params.to_string())
        }
    }

    #[test]
    fn result_into_message_carries_the_call_id() {
        let ok = ToolResult::success("42").into_message("call_1");
        assert_eq!(ok.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(ok.content, "42");

        let failed = ToolResult::failure("no such file").into_message("call_2");
        assert_eq!(failed.tool_call_id.as_deref(), Some("call_2"));
        assert!(failed.content.contains("no such file"));
    }

    #[test]
    fn parse_params_reports_mismatches_as_failures() {
        #[derive(Deserialize, Debug)]
        struct Params {
            #[serde(rename = "expression")]
            _expression: String,
        }

        let err = parse_params::<Params>(json!({"expression": 42})).unwrap_err();
        assert!(!err.success);
        assert!(err.error.unwrap().contains("Invalid parameters"));
    }

    #[test]
    fn registry_preserves_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("beta"));
        registry.register(EchoTool::named("alpha"));

        assert_eq!(registry.names(), vec!["beta", "alpha"]);
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_registration_replaces_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("echo"));
        registry.register(EchoTool::named("echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn tool_set_filtering_is_idempotent() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("alpha"));
        registry.register(EchoTool::named("beta"));
        registry.register(EchoTool::named("gamma"));

        let allowed = vec!["gamma".to_string(), "alpha".to_string()];
        let first = registry.tool_set(Some(&allowed[..]));
        let second = registry.tool_set(Some(&allowed[..]));

        // Registry order wins; re-resolving yields the same effective set.
        assert_eq!(first.names(), vec!["alpha", "gamma"]);
        assert_eq!(first.names(), second.names());
    }

    #[test]
    fn tool_set_without_filter_exposes_everything() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("alpha"));
        let set = registry.tool_set(None);
        assert_eq!(set.names(), vec!["alpha"]);

        let schemas = set.schemas();
        assert_eq!(schemas[0].name, "alpha");
        assert_eq!(schemas[0].description, "Echo the input back");
    }
}
