//! Built-in tool implementations.

mod calculate;
mod note;

pub use calculate::CalculateTool;
pub use note::RecordNoteTool;
