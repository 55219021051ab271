//! Scripted transport double shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::error::{ModelError, ModelResult};
use super::transport::ModelTransport;
use super::types::{Message, ModelReply, ModelRequest, ToolCall};

/// A [`ModelTransport`] that replays a queue of scripted outcomes and
/// records every request it receives.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<ModelResult<ModelReply>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, message: Message) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(ModelReply { message, usage: None }));
    }

    pub fn push_text(&self, text: &str) {
        self.push_reply(Message::assistant(text));
    }

    pub fn push_tool_call(&self, id: &str, name: &str, arguments: Value) {
        self.push_reply(Message::assistant_with_calls(
            "",
            vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
        ));
    }

    pub fn push_err(&self, err: ModelError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: &ModelRequest) -> ModelResult<ModelReply> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".into())))
    }
}
