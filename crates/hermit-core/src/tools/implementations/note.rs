//! Record-note tool - append a note to the session's memory
//!
//! Notes accumulate in the owning session and are exposed as a snapshot for
//! an external persistence layer. Each sub-agent gets its own isolated
//! instance, so a child's notes never leak into the parent's.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::agent::session::SessionNotes;
use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

pub struct RecordNoteTool {
    notes: SessionNotes,
}

#[derive(Deserialize)]
struct Params {
    note: String,
}

impl RecordNoteTool {
    pub fn new(notes: SessionNotes) -> Self {
        Self { notes }
    }
}

#[async_trait]
impl Tool for RecordNoteTool {
    fn name(&self) -> &str {
        "record_note"
    }

    fn description(&self) -> &str {
        "Record a note in session memory for later reference."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "note": {
                    "type": "string",
                    "description": "The note to remember"
                }
            },
            "required": ["note"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if params.note.trim().is_empty() {
            return ToolResult::failure("Cannot record an empty note");
        }

        self.notes.append(params.note.trim());
        ToolResult::success(format!(
            "Noted. {} note(s) recorded this session.",
            self.notes.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notes_accumulate_in_the_session() {
        let notes = SessionNotes::default();
        let tool = RecordNoteTool::new(notes.clone());

        let result = tool
            .execute(json!({"note": "user prefers metric units"}), &ToolContext::default())
            .await;
        assert!(result.success);

        tool.execute(json!({"note": "second fact"}), &ToolContext::default())
            .await;

        let snapshot = notes.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].content, "user prefers metric units");
    }

    #[tokio::test]
    async fn empty_notes_are_rejected() {
        let tool = RecordNoteTool::new(SessionNotes::default());
        let result = tool
            .execute(json!({"note": "   "}), &ToolContext::default())
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn separate_instances_stay_isolated() {
        let parent = SessionNotes::default();
        let child = SessionNotes::default();

        RecordNoteTool::new(parent.clone())
            .execute(json!({"note": "parent note"}), &ToolContext::default())
            .await;
        RecordNoteTool::new(child.clone())
            .execute(json!({"note": "child note"}), &ToolContext::default())
            .await;

        assert_eq!(parent.snapshot().len(), 1);
        assert_eq!(child.snapshot().len(), 1);
        assert_ne!(parent.snapshot()[0].content, child.snapshot()[0].content);
    }
}
