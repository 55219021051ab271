//! Retry/backoff wrapper around the model transport.
//!
//! [`ModelGateway`] is the only way the agent loop reaches the model. It
//! retries transient failures with exponential backoff and jitter, never
//! retries quota or auth failures, and invokes an observer callback before
//! each retry so the caller can surface progress to the user.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{ModelError, ModelResult};
use super::retry::{compute_delay, RetryConfig};
use super::transport::ModelTransport;
use super::types::{Message, ModelReply, ModelRequest};

/// Called before each backoff sleep: (attempt, delay, error description).
pub type RetryObserver = dyn Fn(u32, Duration, &str) + Send + Sync;

#[derive(Clone)]
pub struct ModelGateway {
    transport: Arc<dyn ModelTransport>,
    retry: RetryConfig,
    observer: Option<Arc<RetryObserver>>,
}

impl ModelGateway {
    pub fn new(transport: Arc<dyn ModelTransport>, retry: RetryConfig) -> Self {
        Self {
            transport,
            retry,
            observer: None,
        }
    }

    /// Attach a retry observer.
    pub fn with_observer(mut self, observer: Arc<RetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Send one request, retrying transient failures.
    ///
    /// On success every tool call in the reply carries a unique non-empty
    /// id: missing ids are synthesized, duplicates reject the reply.
    pub async fn send(&self, request: &ModelRequest) -> ModelResult<ModelReply> {
        for attempt in 0..=self.retry.max_retries {
            match self.transport.send(request).await {
                Ok(reply) => {
                    if attempt > 0 {
                        debug!(
                            transport = %self.transport.name(),
                            attempt,
                            "model call succeeded after retry"
                        );
                    }
                    return normalize_reply(reply);
                }
                Err(err) => {
                    if !err.is_retryable() || attempt == self.retry.max_retries {
                        return Err(err);
                    }

                    // Rate limits may suggest a wait; honor it if longer.
                    let computed = compute_delay(&self.retry, attempt);
                    let delay = match err.retry_after_ms() {
                        Some(ms) => computed.max(Duration::from_millis(ms)),
                        None => computed,
                    };

                    warn!(
                        transport = %self.transport.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying model call after transient error"
                    );

                    if let Some(observer) = &self.observer {
                        observer(attempt + 1, delay, &err.to_string());
                    }

                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(ModelError::Transport(
            "retry loop exhausted without error".into(),
        ))
    }

    /// Plain-text completion with no tools offered. Used by the context
    /// summarizer; the output is never parsed for tool calls.
    pub async fn complete_text(&self, system_prompt: &str, input: &str) -> ModelResult<String> {
        let request = ModelRequest::new(vec![
            Message::system(system_prompt),
            Message::user(input),
        ]);

        let reply = self.send(&request).await?;
        Ok(reply.message.content.trim().to_string())
    }
}

/// Enforce the reply contract: unique, non-empty tool-call ids.
fn normalize_reply(mut reply: ModelReply) -> ModelResult<ModelReply> {
    let mut seen = std::collections::HashSet::new();

    for call in &mut reply.message.tool_calls {
        if call.id.is_empty() {
            call.id = format!("call_{}", Uuid::new_v4().simple());
        }
        if !seen.insert(call.id.clone()) {
            return Err(ModelError::InvalidResponse(format!(
                "duplicate tool call id '{}' in response",
                call.id
            )));
        }
    }

    Ok(reply)
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("transport", &self.transport.name())
            .field("retry", &self.retry)
            .finish()
    }
}
