//! Token estimation for context-budget checks.
//!
//! A fixed approximation (four characters per token plus a small
//! per-message overhead) applied uniformly to content and serialized tool
//! payloads. Identical input always produces the identical count; the
//! budget is enforced via this estimate, not provider accounting.

use crate::ai::types::Message;

const CHARS_PER_TOKEN: usize = 4;
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Estimated token cost of a message sequence.
pub fn estimate(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message).sum()
}

/// Whether the sequence exceeds the given budget.
pub fn over_budget(messages: &[Message], limit: usize) -> bool {
    estimate(messages) > limit
}

fn estimate_message(message: &Message) -> usize {
    // Thinking is excluded: it is never sent back to the model.
    let mut chars = message.content.chars().count();

    for call in &message.tool_calls {
        chars += call.name.chars().count();
        chars += call.arguments.to_string().chars().count();
    }

    if let Some(id) = &message.tool_call_id {
        chars += id.chars().count();
    }

    MESSAGE_OVERHEAD_TOKENS + chars.div_ceil(CHARS_PER_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::ToolCall;
    use serde_json::json;

    #[test]
    fn estimate_is_deterministic() {
        let messages = vec![
            Message::system("You are an agent."),
            Message::user("add 2 and 2"),
            Message::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "calculate".into(),
                    arguments: json!({"expression": "2 + 2"}),
                }],
            ),
            Message::tool("call_1", "4"),
        ];

        assert_eq!(estimate(&messages), estimate(&messages));
    }

    #[test]
    fn tool_payloads_are_counted() {
        let bare = vec![Message::assistant("")];
        let with_call = vec![Message::assistant_with_calls(
            "",
            vec![ToolCall {
                id: "call_1".into(),
                name: "calculate".into(),
                arguments: json!({"expression": "15 * 37 + 128"}),
            }],
        )];

        assert!(estimate(&with_call) > estimate(&bare));
    }

    #[test]
    fn thinking_is_free() {
        let mut message = Message::assistant("answer");
        let plain = estimate(std::slice::from_ref(&message));
        message.thinking = Some("a very long chain of hidden reasoning".into());
        assert_eq!(estimate(std::slice::from_ref(&message)), plain);
    }

    #[test]
    fn over_budget_is_a_strict_comparison() {
        let messages = vec![Message::user("hello")];
        let exact = estimate(&messages);
        assert!(!over_budget(&messages, exact));
        assert!(over_budget(&messages, exact - 1));
    }
}
