//! The agent loop.
//!
//! One step: check the token budget (summarize if over), call the model,
//! fold the reply into the transcript, dispatch any tool calls, repeat.
//! The loop ends when the model answers without tool calls, when the hard
//! step bound trips, or when the gateway reports a terminal error.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::ai::gateway::ModelGateway;
use crate::ai::types::ModelRequest;
use crate::ai::ModelError;
use crate::tools::dispatcher;
use crate::tools::registry::{ToolContext, ToolSet};
use crate::transcript::{summarizer, tokens};

use super::events::{AgentEvent, EventSink};
use super::session::Session;

/// Terminal failure of an agent loop.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    /// The summarizing model call itself failed. Proceeding over budget
    /// risks rejection by the transport, so the loop fails instead of
    /// silently skipping compaction.
    #[error("summarization failed: {0}")]
    Summarization(#[source] ModelError),
}

/// Observable state of the loop.
#[derive(Debug)]
pub enum LoopState {
    Running { step: usize },
    AwaitingToolResults { step: usize },
    Completed { answer: String },
    Failed { error: String },
}

/// Per-run limits, combined from the engine defaults and the agent
/// definition.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Hard bound on model calls per run.
    pub max_steps: usize,
    /// Token budget that triggers summarization.
    pub context_budget: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            context_budget: 100_000,
        }
    }
}

/// Drives one session to completion.
pub struct AgentRunner {
    gateway: Arc<ModelGateway>,
    tools: ToolSet,
    session: Session,
    config: LoopConfig,
    ctx: ToolContext,
    events: EventSink,
    state: LoopState,
}

impl AgentRunner {
    pub fn new(
        gateway: Arc<ModelGateway>,
        tools: ToolSet,
        session: Session,
        config: LoopConfig,
    ) -> Self {
        Self {
            gateway,
            tools,
            session,
            config,
            ctx: ToolContext::default(),
            events: EventSink::disabled(),
            state: LoopState::Running { step: 0 },
        }
    }

    pub fn with_context(mut self, ctx: ToolContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the loop to `Completed` or `Failed`. Returns the final answer.
    pub async fn run(&mut self) -> Result<String, EngineError> {
        // Per-run gateway whose retry observer feeds the event sink.
        let retry_events = self.events.clone();
        let gateway = self
            .gateway
            .as_ref()
            .clone()
            .with_observer(Arc::new(move |attempt, delay, error| {
                retry_events.emit(AgentEvent::ModelCallRetry {
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    error: error.to_string(),
                });
            }));

        let mut step = 0usize;

        loop {
            self.state = LoopState::Running { step };
            self.events.emit(AgentEvent::StepStarted { step: step + 1 });

            if let Err(err) = self.compact_if_over_budget(&gateway).await {
                return Err(self.fail(err));
            }

            let request = ModelRequest::new(self.session.transcript.render())
                .with_tools(self.tools.schemas());

            let reply = match gateway.send(&request).await {
                Ok(reply) => reply,
                Err(err) => return Err(self.fail(EngineError::Model(err))),
            };

            let assistant = reply.message;
            let tool_calls = assistant.tool_calls.clone();
            self.session.transcript.append(assistant.clone());
            step += 1;

            if tool_calls.is_empty() {
                return Ok(self.complete(assistant.content, step));
            }

            self.state = LoopState::AwaitingToolResults { step };
            let results =
                dispatcher::dispatch(&tool_calls, &self.tools, &self.ctx, &self.events).await;
            for message in results {
                self.session.transcript.append(message);
            }

            if step >= self.config.max_steps {
                // Hard bound, not a retry condition: close out with a
                // best-effort answer.
                let answer = self
                    .session
                    .transcript
                    .last_assistant_text()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        format!(
                            "Stopped after reaching the step limit ({} steps).",
                            self.config.max_steps
                        )
                    });
                warn!(
                    session = %self.session.id,
                    max_steps = self.config.max_steps,
                    "step limit reached, returning best-effort answer"
                );
                return Ok(self.complete(answer, step));
            }
        }
    }

    async fn compact_if_over_budget(&mut self, gateway: &ModelGateway) -> Result<(), EngineError> {
        let messages = self.session.transcript.messages();
        if !tokens::over_budget(messages, self.config.context_budget) {
            return Ok(());
        }

        info!(
            session = %self.session.id,
            estimate = tokens::estimate(messages),
            budget = self.config.context_budget,
            "transcript over budget, summarizing"
        );

        let report = summarizer::compact(&mut self.session.transcript, gateway)
            .await
            .map_err(EngineError::Summarization)?;

        self.events.emit(AgentEvent::SummarizationTriggered {
            segments: report.segments_collapsed,
            tokens_before: report.tokens_before,
            tokens_after: report.tokens_after,
        });

        if report.tokens_after > self.config.context_budget {
            // One pass only; a span that cannot shrink further is the
            // transport's concern from here.
            warn!(
                session = %self.session.id,
                estimate = report.tokens_after,
                budget = self.config.context_budget,
                "still over budget after summarization, proceeding"
            );
        }

        Ok(())
    }

    fn complete(&mut self, answer: String, steps: usize) -> String {
        self.state = LoopState::Completed {
            answer: answer.clone(),
        };
        self.events.emit(AgentEvent::Completed {
            answer: answer.clone(),
            steps,
        });
        info!(session = %self.session.id, steps, "agent loop completed");
        answer
    }

    fn fail(&mut self, error: EngineError) -> EngineError {
        // Never leave dangling tool calls behind, whatever path failed.
        let closed = self
            .session
            .transcript
            .close_unresolved("agent loop terminated");
        if closed > 0 {
            warn!(session = %self.session.id, closed, "closed unresolved tool calls on failure");
        }

        self.state = LoopState::Failed {
            error: error.to_string(),
        };
        self.events.emit(AgentEvent::Failed {
            error: error.to_string(),
        });
        error
    }
}
