//! Hermit core - a bounded agent execution engine.
//!
//! The engine drives a loop of model calls and tool invocations over an
//! append-only transcript, keeps the transcript under a token budget by
//! summarizing closed conversation segments, and can delegate sub-tasks to
//! restricted child agents with bounded recursion.
//!
//! ```text
//!  AgentRunner ──► ModelGateway ──► ModelTransport (HTTP)
//!      │                                   ▲
//!      ├─► Tool Dispatcher ──► Tools       │
//!      │        └─► InvokeAgentTool ── child AgentRunner ──┘
//!      └─► Transcript ──► Token estimate ──► Summarizer
//! ```
//!
//! Everything observable happens through [`agent::AgentEvent`]s; nothing in
//! the core formats output or touches persistent storage.

pub mod agent;
pub mod agents;
pub mod ai;
pub mod config;
pub mod tools;
pub mod transcript;

pub use agent::{AgentEvent, AgentRunner, EngineError, EventSink, LoopConfig, LoopState, Session};
pub use agents::{compose_system_prompt, AgentDefinition, AgentLibrary, InvokeAgentTool};
pub use ai::{
    HttpTransport, Message, ModelError, ModelGateway, ModelTransport, RetryConfig, Role,
    TransportConfig,
};
pub use config::EngineConfig;
pub use tools::{Tool, ToolContext, ToolRegistry, ToolResult, ToolSet};
pub use transcript::Transcript;
