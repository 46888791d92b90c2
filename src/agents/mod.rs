//! Assistant bridge for Hestia
//!
//! Connects a hosted conversational assistant to local home-automation
//! functions:
//! - Turn engine driving runs through tool calls to an answer
//! - Function registry of what the assistant may invoke
//! - Argument codec that keeps regex patterns intact
//! - Session manager mapping conversations to threads
//! - Knowledge-store synchronization, routing and assistant provisioning
//! - Generated-file collection
//!
//! ## Architecture
//!
//! - `domain/` - Wire-independent types (Run, ToolCall, ThreadMessage, FileObject)
//! - `transport/` - Ports to the assistant API and the OpenAI implementation
//! - `core/` - Turn engine and prompt rendering

pub mod artifacts;
pub mod assistant;
pub mod codec;
pub mod core;
pub mod domain;
pub mod error;
pub mod knowledge;
pub mod registry;
pub mod selector;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use self::core::{TurnEngine, TurnOutcome, TurnReport, TurnRequest};
pub use domain::*;
pub use error::*;
pub use registry::{FunctionRegistry, HomeFunction};
pub use session::{SessionManager, DEFAULT_SESSION};
