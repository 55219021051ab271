//! Structured events emitted by the agent loop.
//!
//! The core does not format or route these; a consumer (CLI, server, test)
//! receives them over an unbounded channel and decides what to show.
//! Emission is send-and-forget: a dropped receiver never stalls the loop.

use serde::Serialize;
use tokio::sync::mpsc;

/// A discrete state change in the agent loop.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A loop step is starting (1-based).
    StepStarted { step: usize },

    /// The gateway is about to back off before retrying a model call.
    ModelCallRetry {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },

    /// The transcript went over budget and was compacted.
    SummarizationTriggered {
        segments: usize,
        tokens_before: usize,
        tokens_after: usize,
    },

    /// A tool call is being executed.
    ToolInvoked { id: String, name: String },

    /// A tool call finished.
    ToolCompleted {
        id: String,
        name: String,
        success: bool,
    },

    /// A sub-agent was invoked.
    SubAgentInvoked { agent: String, task: String },

    /// A sub-agent finished.
    SubAgentCompleted { agent: String, success: bool },

    /// The loop reached a final answer.
    Completed { answer: String, steps: usize },

    /// The loop terminated with an error.
    Failed { error: String },
}

/// Fire-and-forget event emitter.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl EventSink {
    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A connected sink plus the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
