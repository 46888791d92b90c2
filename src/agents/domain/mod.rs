//! Domain types for the assistant bridge
//!
//! Transport-independent representations of runs, tool calls, thread
//! messages, files and vector stores.

mod file;
mod message;
mod run;
mod tool_call;

pub use file::*;
pub use message::*;
pub use run::*;
pub use tool_call::*;
