//! Per-agent session state.
//!
//! A session owns its transcript, its recursion depth, and its notes.
//! Sessions are never shared: a sub-agent gets a fresh one, and only the
//! final answer crosses back to the parent.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transcript::Transcript;

/// One structured memory entry recorded during a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionNote {
    pub recorded_at: DateTime<Utc>,
    pub content: String,
}

/// Shared handle to a session's note list. Cloning shares the underlying
/// storage; distinct sessions get distinct handles.
#[derive(Debug, Clone, Default)]
pub struct SessionNotes {
    entries: Arc<Mutex<Vec<SessionNote>>>,
}

impl SessionNotes {
    pub fn append(&self, content: impl Into<String>) {
        self.entries.lock().unwrap().push(SessionNote {
            recorded_at: Utc::now(),
            content: content.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Copy of the notes for an external persistence layer to snapshot.
    pub fn snapshot(&self) -> Vec<SessionNote> {
        self.entries.lock().unwrap().clone()
    }
}

/// One agent's isolated conversation + state bundle.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub transcript: Transcript,
    /// 0 for the root agent; +1 per sub-agent nesting level.
    pub call_depth: u32,
    pub notes: SessionNotes,
}

impl Session {
    /// Create a session seeded with a system prompt and the caller's task.
    pub fn new(system_prompt: impl Into<String>, task: impl Into<String>, call_depth: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            transcript: Transcript::seeded(system_prompt, task),
            call_depth,
            notes: SessionNotes::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::Role;

    #[test]
    fn new_session_is_seeded_and_isolated() {
        let a = Session::new("sys", "task one", 0);
        let b = Session::new("sys", "task two", 1);

        assert_ne!(a.id, b.id);
        assert_eq!(a.call_depth, 0);
        assert_eq!(b.call_depth, 1);
        assert_eq!(a.transcript.messages()[0].role, Role::System);
        assert_eq!(a.transcript.messages()[1].content, "task one");
    }

    #[test]
    fn notes_snapshot_is_a_copy() {
        let session = Session::new("sys", "task", 0);
        session.notes.append("remember this");

        let snapshot = session.notes.snapshot();
        session.notes.append("and this");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(session.notes.len(), 2);
    }
}
