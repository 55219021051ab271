//! Agent loop: session state, the step state machine, and loop events.

pub mod events;
pub mod runner;
pub mod session;

pub use events::{AgentEvent, EventSink};
pub use runner::{AgentRunner, EngineError, LoopConfig, LoopState};
pub use session::{Session, SessionNote, SessionNotes};
