//! Sub-agent invocation.
//!
//! [`InvokeAgentTool`] is the one tool that exposes sub-agents to a loop.
//! Each invocation builds a fresh child session one level deeper, with a
//! tool set filtered down to the child definition's whitelist, runs a full
//! agent loop on it, and returns only the final answer to the caller.
//! Unknown agents and depth violations come back as failed results, never
//! as errors that could kill the parent loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::agent::events::{AgentEvent, EventSink};
use crate::agent::runner::AgentRunner;
use crate::agent::session::{Session, SessionNotes};
use crate::ai::gateway::ModelGateway;
use crate::config::EngineConfig;
use crate::tools::implementations::RecordNoteTool;
use crate::tools::registry::{parse_params, Tool, ToolContext, ToolRegistry, ToolResult, ToolSet};

use super::definition::{AgentDefinition, AgentLibrary};
use super::compose_system_prompt;

/// Tool names that are session-scoped and never inherited from the parent.
const SESSION_TOOLS: [&str; 2] = ["invoke_agent", "record_note"];

#[derive(Clone)]
pub struct InvokeAgentTool {
    library: Arc<AgentLibrary>,
    registry: Arc<ToolRegistry>,
    gateway: Arc<ModelGateway>,
    config: EngineConfig,
    /// Skill names available in this process, for whitelist intersection.
    skills: Arc<Vec<String>>,
    call_depth: u32,
    events: EventSink,
    description: String,
}

#[derive(Deserialize)]
struct Params {
    agent_name: String,
    task: String,
}

impl InvokeAgentTool {
    pub fn new(
        library: Arc<AgentLibrary>,
        registry: Arc<ToolRegistry>,
        gateway: Arc<ModelGateway>,
        config: EngineConfig,
    ) -> Self {
        let description = describe(&library);
        Self {
            library,
            registry,
            gateway,
            config,
            skills: Arc::new(Vec::new()),
            call_depth: 0,
            events: EventSink::disabled(),
            description,
        }
    }

    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.skills = Arc::new(skills);
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Copy of this tool bound to a deeper nesting level.
    pub fn at_depth(&self, call_depth: u32) -> Self {
        Self {
            call_depth,
            ..self.clone()
        }
    }

    /// The child's effective tool set: the whitelist intersected with the
    /// registry (or everything when unrestricted), minus session-scoped
    /// tools, plus an isolated note tool and, while depth remains, a
    /// deeper invocation tool.
    fn child_tool_set(
        &self,
        definition: &AgentDefinition,
        notes: &SessionNotes,
        child_depth: u32,
    ) -> ToolSet {
        let mut tools = self
            .registry
            .tool_set(definition.allowed_tools.as_deref());
        tools.retain(|name| !SESSION_TOOLS.contains(&name));

        let wants_notes = definition
            .allowed_tools
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|n| n == "record_note"));
        if wants_notes {
            tools.push(Arc::new(RecordNoteTool::new(notes.clone())));
        }

        if child_depth < self.config.max_depth {
            tools.push(Arc::new(self.at_depth(child_depth)));
        }

        tools
    }

    fn child_skills(&self, definition: &AgentDefinition) -> Vec<String> {
        match &definition.allowed_skills {
            None => self.skills.as_ref().clone(),
            Some(allowed) => self
                .skills
                .iter()
                .filter(|s| allowed.contains(s))
                .cloned()
                .collect(),
        }
    }
}

fn describe(library: &AgentLibrary) -> String {
    let names = library.names();
    let listing = if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    };
    format!(
        "Invoke a specialized sub-agent for a focused task. The sub-agent runs \
         independently and returns its final answer. Available agents: {listing}"
    )
}

#[async_trait]
impl Tool for InvokeAgentTool {
    fn name(&self) -> &str {
        "invoke_agent"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let names = self.library.names();
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "description": "Name of the agent to invoke",
                    "enum": names,
                },
                "task": {
                    "type": "string",
                    "description": "The task for the sub-agent. Be specific and self-contained."
                }
            },
            "required": ["agent_name", "task"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let Params { agent_name, task } = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if self.call_depth >= self.config.max_depth {
            return ToolResult::failure(format!(
                "Sub-agents cannot invoke other agents (max depth: {})",
                self.config.max_depth
            ));
        }

        let Some(definition) = self.library.get(&agent_name) else {
            let available = self.library.names().join(", ");
            return ToolResult::failure(format!(
                "Agent '{agent_name}' not found. Available agents: {available}"
            ));
        };

        info!(agent = %agent_name, depth = self.call_depth + 1, "invoking sub-agent");
        self.events.emit(AgentEvent::SubAgentInvoked {
            agent: agent_name.clone(),
            task: task.clone(),
        });

        let child_depth = self.call_depth + 1;
        let notes = SessionNotes::default();
        let tools = self.child_tool_set(definition, &notes, child_depth);
        let skills = self.child_skills(definition);

        // The child sees sub-agent metadata only if it can still delegate.
        let subagents = (child_depth < self.config.max_depth).then(|| self.library.as_ref());
        let system_prompt = compose_system_prompt(
            &definition.render_system_prompt(&task),
            &ctx.workspace_dir,
            &tools.names(),
            &skills,
            subagents,
        );

        let mut session = Session::new(system_prompt, &task, child_depth);
        session.notes = notes;

        let mut runner = AgentRunner::new(
            self.gateway.clone(),
            tools,
            session,
            self.config.loop_config(definition.max_steps),
        )
        .with_context(ToolContext::new(ctx.workspace_dir.clone()))
        .with_events(self.events.clone());

        let outcome = runner.run().await;

        let result = match outcome {
            Ok(answer) => ToolResult::success(format!(
                "Sub-agent '{agent_name}' completed task.\n\nResult:\n{answer}"
            )),
            Err(error) => {
                ToolResult::failure(format!("Sub-agent '{agent_name}' failed: {error}"))
            }
        };

        self.events.emit(AgentEvent::SubAgentCompleted {
            agent: agent_name,
            success: result.success,
        });

        result
    }
}
