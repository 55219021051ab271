//! Outbound model transport.
//!
//! [`ModelTransport`] is the seam between the engine and the network: one
//! call, one classified result. [`HttpTransport`] is the production
//! implementation and speaks the OpenAI-compatible chat-completions wire
//! format, which any of the usual providers accept.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::error::{is_quota_exhausted, ModelError, ModelResult};
use super::types::{Message, ModelReply, ModelRequest, Role, ToolCall, Usage};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A single model call: rendered messages + tool schemas in, one assistant
/// message (or a classified failure) out.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Identifier used in logs and retry diagnostics.
    fn name(&self) -> &str;

    async fn send(&self, request: &ModelRequest) -> ModelResult<ModelReply>;
}

/// Connection settings for [`HttpTransport`].
///
/// Built explicitly by the caller — the transport never reads ambient
/// process state.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL up to but excluding `/chat/completions`.
    pub base_url: String,
    pub api_key: String,
    /// Model ID sent with every request.
    pub model: String,
    /// Maximum output tokens per completion.
    pub max_output_tokens: usize,
    /// Extra headers some providers require.
    pub headers: HashMap<String, String>,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_output_tokens: 4096,
            headers: HashMap::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// OpenAI-compatible HTTP transport.
pub struct HttpTransport {
    config: TransportConfig,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn build_body(&self, request: &ModelRequest) -> Value {
        let messages: Vec<WireMessage> = request.messages.iter().map(WireMessage::from).collect();

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_output_tokens,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }

    async fn classify_failure(&self, response: reqwest::Response) -> ModelError {
        let status = response.status().as_u16();

        if status == 429 {
            let header_ms = parse_retry_after_header(&response);
            let body = response.text().await.unwrap_or_default();

            // Some providers reuse 429 for exhausted credits, which must
            // not be retried.
            if is_quota_exhausted(&body) {
                let msg = extract_error_message(&body)
                    .unwrap_or_else(|| "credits exhausted or spending limit reached".into());
                warn!(transport = %self.name(), "quota exhausted (not retryable)");
                return ModelError::Quota(msg);
            }

            let retry_ms = header_ms
                .or_else(|| parse_retry_after_ms(&body))
                .unwrap_or(1000);
            warn!(transport = %self.name(), retry_after_ms = retry_ms, "rate limited");
            return ModelError::RateLimited {
                retry_after_ms: retry_ms,
            };
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_error_message(&body).unwrap_or(body);

        match status {
            401 | 403 => ModelError::Auth(detail),
            s if is_quota_exhausted(&detail) => {
                warn!(transport = %self.name(), status = s, "quota exhausted (not retryable)");
                ModelError::Quota(detail)
            }
            s if s >= 500 => ModelError::Transport(format!("HTTP {s}: {detail}")),
            s => ModelError::InvalidResponse(format!("HTTP {s}: {detail}")),
        }
    }
}

#[async_trait]
impl ModelTransport for HttpTransport {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: &ModelRequest) -> ModelResult<ModelReply> {
        debug!(
            transport = %self.name(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion request"
        );

        let mut req = self
            .http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        for (k, v) in &self.config.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req.json(&self.build_body(request)).send().await?;

        if !response.status().is_success() {
            return Err(self.classify_failure(response).await);
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("failed to parse response: {e}")))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("response contained no choices".into()))?;

        Ok(ModelReply {
            message: choice.message.into_message(),
            usage: wire.usage,
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("api_key", &"***")
            .finish()
    }
}

// ── Wire format ────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    /// Reasoning text some providers attach; never sent outbound.
    #[serde(default, skip_serializing)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded arguments, per the wire format.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let tool_calls = if msg.tool_calls.is_empty() {
            None
        } else {
            Some(
                msg.tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        call_type: "function".into(),
                        function: WireFunction {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };

        Self {
            role: role.into(),
            content: Some(msg.content.clone()),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
            reasoning_content: None,
        }
    }
}

impl WireMessage {
    fn into_message(self) -> Message {
        let tool_calls = self
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                // Malformed argument JSON is kept verbatim; parameter
                // validation downstream turns it into a tool-level error.
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
            })
            .collect();

        Message {
            role: Role::Assistant,
            content: self.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
            thinking: self.reasoning_content,
        }
    }
}

/// Extract a human-readable message from a JSON error body.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.get("error").and_then(|v| {
        v.get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .or_else(|| v.as_str().map(String::from))
    })
}

/// Retry-after from the HTTP header, in milliseconds. Only the numeric
/// form is handled; HTTP-date is rare for API providers.
fn parse_retry_after_header(response: &reqwest::Response) -> Option<u64> {
    let header_val = response
        .headers()
        .get("retry-after")
        .or_else(|| response.headers().get("x-ratelimit-reset-after"))
        .and_then(|v| v.to_str().ok())?;

    header_val
        .parse::<f64>()
        .ok()
        .map(|secs| (secs * 1000.0).max(0.0) as u64)
}

/// Retry-after from a JSON error body, in milliseconds.
fn parse_retry_after_ms(body: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after_ms")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            value
                .get("retry_after")
                .and_then(|v| v.as_f64())
                .map(|secs| (secs * 1000.0) as u64)
        })
}
