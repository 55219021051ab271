//! Context summarization.
//!
//! When the transcript exceeds the token budget, closed agent/tool spans are
//! collapsed into single synthesized assistant messages. User messages are
//! never touched — they carry intent — and the span after the most recent
//! user message is the turn in progress, so it is never summarized either.
//!
//! One pass only: if a single oversized span still leaves the transcript
//! over budget, the result is accepted and any rejection is the transport's
//! to report.

use tracing::{debug, info};

use crate::ai::gateway::ModelGateway;
use crate::ai::types::{Message, Role};
use crate::ai::ModelResult;

use super::store::Transcript;
use super::tokens;

const SUMMARY_SYSTEM_PROMPT: &str = "You condense agent work logs. Given a span of \
assistant turns and tool results, write a short factual summary of what was attempted, \
which tools were used and their outcomes, and what was concluded. Reply with the \
summary text only.";

/// What a compaction pass did to the transcript.
#[derive(Debug, Clone, Default)]
pub struct CompactionReport {
    pub segments_collapsed: usize,
    pub messages_removed: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

/// Collapse every closed segment of the transcript, issuing one summary
/// model call per segment. Failure of any summary call propagates with the
/// gateway's classification.
pub async fn compact(
    transcript: &mut Transcript,
    gateway: &ModelGateway,
) -> ModelResult<CompactionReport> {
    let tokens_before = tokens::estimate(transcript.messages());
    let spans = closed_spans(transcript.messages());

    if spans.is_empty() {
        debug!("no closed segments to summarize");
        return Ok(CompactionReport {
            tokens_before,
            tokens_after: tokens_before,
            ..Default::default()
        });
    }

    let mut replacements = Vec::with_capacity(spans.len());
    for &(start, end) in &spans {
        let segment_text = render_segment(&transcript.messages()[start..end]);
        let summary = gateway
            .complete_text(SUMMARY_SYSTEM_PROMPT, &segment_text)
            .await?;
        replacements.push((start, end, Message::assistant(summary)));
    }

    // Apply back-to-front so earlier indices stay valid.
    let mut messages_removed = 0;
    for (start, end, replacement) in replacements.into_iter().rev() {
        messages_removed += end - start - 1;
        transcript.collapse_span(start, end, replacement);
    }

    let tokens_after = tokens::estimate(transcript.messages());
    info!(
        segments = spans.len(),
        messages_removed,
        tokens_before,
        tokens_after,
        "transcript compacted"
    );

    Ok(CompactionReport {
        segments_collapsed: spans.len(),
        messages_removed,
        tokens_before,
        tokens_after,
    })
}

/// Maximal assistant/tool runs that end at or before the most recent user
/// message. Runs shorter than two messages are skipped: they are usually
/// prior summaries and collapsing them cannot shrink the transcript.
fn closed_spans(messages: &[Message]) -> Vec<(usize, usize)> {
    let Some(last_user) = messages.iter().rposition(|m| m.role == Role::User) else {
        return Vec::new();
    };

    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, message) in messages.iter().enumerate().take(last_user) {
        match message.role {
            Role::Assistant | Role::Tool => {
                start.get_or_insert(i);
            }
            _ => {
                if let Some(s) = start.take() {
                    if i - s >= 2 {
                        spans.push((s, i));
                    }
                }
            }
        }
    }

    if let Some(s) = start {
        if last_user - s >= 2 {
            spans.push((s, last_user));
        }
    }

    spans
}

/// Plain-text rendering of one segment, the exact summary-call input.
fn render_segment(segment: &[Message]) -> String {
    let mut text = String::new();

    for message in segment {
        match message.role {
            Role::Assistant => {
                if !message.content.is_empty() {
                    text.push_str("assistant: ");
                    text.push_str(&message.content);
                    text.push('\n');
                }
                for call in &message.tool_calls {
                    text.push_str(&format!(
                        "assistant -> {}({})\n",
                        call.name, call.arguments
                    ));
                }
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().unwrap_or("?");
                text.push_str(&format!("tool[{id}]: {}\n", message.content));
            }
            _ => {}
        }
    }

    text
}
