//! Append-only conversation store.
//!
//! The transcript is the single source of truth for one session's
//! conversation. Messages are only ever appended; the sole removal path is
//! [`Transcript::collapse_span`], reserved for the context summarizer.

use crate::ai::types::{Message, Role, ToolCall};

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transcript with the system prompt and the caller's task.
    pub fn seeded(system_prompt: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(task)],
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The exact ordered sequence to submit as the next model request.
    /// Thinking text never goes back to the model.
    pub fn render(&self) -> Vec<Message> {
        self.messages.iter().map(Message::without_thinking).collect()
    }

    /// Most recent non-empty assistant text, for best-effort answers.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.content.is_empty())
            .map(|m| m.content.as_str())
    }

    /// Tool calls that have no matching tool-role result yet, in call order.
    pub fn unresolved_tool_calls(&self) -> Vec<ToolCall> {
        let mut pending: Vec<ToolCall> = Vec::new();

        for message in &self.messages {
            for call in &message.tool_calls {
                pending.push(call.clone());
            }
            if let Some(id) = &message.tool_call_id {
                pending.retain(|call| &call.id != id);
            }
        }

        pending
    }

    /// Close every unresolved tool call with a synthesized failure result.
    /// Called before abandoning a transcript so no call is left dangling.
    pub fn close_unresolved(&mut self, reason: &str) -> usize {
        let pending = self.unresolved_tool_calls();
        let closed = pending.len();

        for call in pending {
            self.append(Message::tool(
                call.id,
                format!("Tool call was not executed: {reason}"),
            ));
        }

        closed
    }

    /// Replace `start..end` with a single message. Summarizer use only.
    pub(crate) fn collapse_span(&mut self, start: usize, end: usize, replacement: Message) {
        self.messages.splice(start..end, std::iter::once(replacement));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "calculate".into(),
            arguments: json!({}),
        }
    }

    #[test]
    fn seeded_starts_with_system_and_task() {
        let transcript = Transcript::seeded("You are helpful.", "do the thing");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[0].role, Role::System);
        assert_eq!(transcript.messages()[1].role, Role::User);
        assert_eq!(transcript.messages()[1].content, "do the thing");
    }

    #[test]
    fn render_strips_thinking_but_keeps_order() {
        let mut transcript = Transcript::seeded("sys", "task");
        let mut reply = Message::assistant("done");
        reply.thinking = Some("hidden".into());
        transcript.append(reply);

        let rendered = transcript.render();
        assert_eq!(rendered.len(), 3);
        assert!(rendered.iter().all(|m| m.thinking.is_none()));
        assert_eq!(rendered[2].content, "done");
    }

    #[test]
    fn unresolved_tracks_pairing() {
        let mut transcript = Transcript::seeded("sys", "task");
        transcript.append(Message::assistant_with_calls(
            "",
            vec![call("call_1"), call("call_2")],
        ));
        assert_eq!(transcript.unresolved_tool_calls().len(), 2);

        transcript.append(Message::tool("call_1", "ok"));
        let pending = transcript.unresolved_tool_calls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "call_2");

        transcript.append(Message::tool("call_2", "ok"));
        assert!(transcript.unresolved_tool_calls().is_empty());
    }

    #[test]
    fn close_unresolved_synthesizes_failures() {
        let mut transcript = Transcript::seeded("sys", "task");
        transcript.append(Message::assistant_with_calls("", vec![call("call_1")]));

        let closed = transcript.close_unresolved("loop aborted");
        assert_eq!(closed, 1);
        assert!(transcript.unresolved_tool_calls().is_empty());

        let last = transcript.messages().last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
        assert!(last.content.contains("loop aborted"));
    }

    #[test]
    fn last_assistant_text_skips_empty_tool_call_turns() {
        let mut transcript = Transcript::seeded("sys", "task");
        transcript.append(Message::assistant("first answer"));
        transcript.append(Message::assistant_with_calls("", vec![call("call_1")]));
        transcript.append(Message::tool("call_1", "ok"));

        assert_eq!(transcript.last_assistant_text(), Some("first answer"));
    }

    #[test]
    fn collapse_span_replaces_range_with_one_message() {
        let mut transcript = Transcript::seeded("sys", "task");
        transcript.append(Message::assistant("a"));
        transcript.append(Message::assistant("b"));
        transcript.append(Message::user("next"));

        transcript.collapse_span(2, 4, Message::assistant("summary"));
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.messages()[2].content, "summary");
        assert_eq!(transcript.messages()[3].content, "next");
    }
}
