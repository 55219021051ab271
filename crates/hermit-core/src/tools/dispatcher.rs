//! Tool-call dispatch for one assistant turn.
//!
//! Every requested call produces exactly one tool-role message. Executions
//! run concurrently, but results are re-serialized into the original call
//! order before they reach the transcript, so the transcript is
//! deterministic even when completion order is not. Nothing a tool does —
//! unknown name, execution error, panic, timeout — terminates the loop;
//! it all comes back as a failed result the model can reason about.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::agent::events::{AgentEvent, EventSink};
use crate::ai::types::{Message, ToolCall};

use super::registry::{Tool, ToolContext, ToolResult, ToolSet};

enum Execution {
    Unavailable,
    Running(JoinHandle<ToolResult>),
}

/// Execute a batch of tool calls against the agent's tool set.
///
/// Returns one tool-role message per call, in call order.
pub async fn dispatch(
    calls: &[ToolCall],
    tools: &ToolSet,
    ctx: &ToolContext,
    events: &EventSink,
) -> Vec<Message> {
    let mut executions = Vec::with_capacity(calls.len());

    for call in calls {
        events.emit(AgentEvent::ToolInvoked {
            id: call.id.clone(),
            name: call.name.clone(),
        });

        match tools.get(&call.name) {
            None => executions.push(Execution::Unavailable),
            Some(tool) => {
                let params = call.arguments.clone();
                let ctx = ctx.clone();
                let timeout = ctx.timeout.unwrap_or(tools.default_timeout());
                executions.push(Execution::Running(tokio::spawn(async move {
                    run_tool(tool, params, ctx, timeout).await
                })));
            }
        }
    }

    let mut messages = Vec::with_capacity(calls.len());

    for (call, execution) in calls.iter().zip(executions) {
        let result = match execution {
            Execution::Unavailable => ToolResult::failure(format!(
                "Tool '{}' is not available to this agent",
                call.name
            )),
            Execution::Running(handle) => handle.await.unwrap_or_else(|e| {
                ToolResult::failure(format!("Tool '{}' execution aborted: {e}", call.name))
            }),
        };

        debug!(tool = %call.name, id = %call.id, success = result.success, "tool finished");
        events.emit(AgentEvent::ToolCompleted {
            id: call.id.clone(),
            name: call.name.clone(),
            success: result.success,
        });

        messages.push(result.into_message(call.id.clone()));
    }

    messages
}

async fn run_tool(
    tool: Arc<dyn Tool>,
    params: Value,
    ctx: ToolContext,
    timeout: std::time::Duration,
) -> ToolResult {
    match tokio::time::timeout(timeout, tool.execute(params, &ctx)).await {
        Ok(result) => result,
        Err(_) => ToolResult::failure(format!(
            "Tool '{}' timed out after {} seconds",
            tool.name(),
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::Role;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct SleepyTool {
        delay_ms: u64,
    }

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Sleep then echo"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            ToolResult::success(params["tag"].as_str().unwrap_or("").to_string())
        }
    }

    struct PanickyTool;

    #[async_trait]
    impl Tool for PanickyTool {
        fn name(&self) -> &str {
            "panicky"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
            panic!("tool blew up");
        }
    }

    fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn every_call_gets_exactly_one_result_in_order() {
        let mut tools = ToolSet::default();
        tools.push(Arc::new(SleepyTool { delay_ms: 30 }));

        // First call sleeps longer than the second; transcript order must
        // still match call order.
        let calls = vec![
            call("call_a", "sleepy", json!({"tag": "slow"})),
            call("call_b", "sleepy", json!({"tag": "fast"})),
        ];

        let messages = dispatch(
            &calls,
            &tools,
            &ToolContext::default(),
            &EventSink::disabled(),
        )
        .await;

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_b"));
        assert!(messages.iter().all(|m| m.role == Role::Tool));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_a_failed_result() {
        let tools = ToolSet::default();
        let calls = vec![call("call_1", "ghost_tool", json!({}))];

        let messages = dispatch(
            &calls,
            &tools,
            &ToolContext::default(),
            &EventSink::disabled(),
        )
        .await;

        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("ghost_tool"));
        assert!(messages[0].content.contains("not available"));
    }

    #[tokio::test]
    async fn panicking_tool_is_contained() {
        let mut tools = ToolSet::default();
        tools.push(Arc::new(PanickyTool));

        let calls = vec![call("call_1", "panicky", json!({}))];
        let messages = dispatch(
            &calls,
            &tools,
            &ToolContext::default(),
            &EventSink::disabled(),
        )
        .await;

        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with("Error:"));
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let mut tools = ToolSet::default().with_timeout(Duration::from_millis(10));
        tools.push(Arc::new(SleepyTool { delay_ms: 5_000 }));

        let calls = vec![call("call_1", "sleepy", json!({"tag": "x"}))];
        let messages = dispatch(
            &calls,
            &tools,
            &ToolContext::default(),
            &EventSink::disabled(),
        )
        .await;

        assert!(messages[0].content.contains("timed out"));
    }

    #[tokio::test]
    async fn events_report_each_call() {
        let (events, mut rx) = EventSink::channel();
        let mut tools = ToolSet::default();
        tools.push(Arc::new(SleepyTool { delay_ms: 1 }));

        let calls = vec![
            call("call_1", "sleepy", json!({"tag": "a"})),
            call("call_2", "ghost", json!({})),
        ];
        dispatch(&calls, &tools, &ToolContext::default(), &events).await;

        let mut invoked = 0;
        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                AgentEvent::ToolInvoked { .. } => invoked += 1,
                AgentEvent::ToolCompleted { .. } => completed += 1,
                _ => {}
            }
        }
        assert_eq!(invoked, 2);
        assert_eq!(completed, 2);
    }
}
