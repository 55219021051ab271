//! Conversation state: the message store, token accounting, and
//! context summarization.

mod store;
pub mod summarizer;
pub mod tokens;

pub use store::Transcript;
pub use summarizer::{compact, CompactionReport};
