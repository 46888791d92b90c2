//! Run types: the server-side execution of one assistant turn

use serde::{Deserialize, Serialize};

use super::ToolCall;

/// Status of a run as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    /// Any status this crate does not know about, kept verbatim
    #[serde(untagged)]
    Unknown(String),
}

/// The coarse phase the turn engine reasons about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Still queued or in progress
    Pending,
    /// Waiting for tool outputs
    RequiresAction,
    /// Finished with an answer
    Completed,
    /// Anything else; treated as failure
    Unexpected,
}

impl RunStatus {
    pub fn phase(&self) -> RunPhase {
        match self {
            RunStatus::Queued | RunStatus::InProgress => RunPhase::Pending,
            RunStatus::RequiresAction => RunPhase::RequiresAction,
            RunStatus::Completed => RunPhase::Completed,
            _ => RunPhase::Unexpected,
        }
    }

    /// Whether polling should keep waiting on this status
    pub fn is_pending(&self) -> bool {
        self.phase() == RunPhase::Pending || *self == RunStatus::Cancelling
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "queued"),
            RunStatus::InProgress => write!(f, "in_progress"),
            RunStatus::RequiresAction => write!(f, "requires_action"),
            RunStatus::Cancelling => write!(f, "cancelling"),
            RunStatus::Cancelled => write!(f, "cancelled"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Incomplete => write!(f, "incomplete"),
            RunStatus::Expired => write!(f, "expired"),
            RunStatus::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Error reported by the server for a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

/// A run against a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    /// Tool calls awaiting outputs; only populated in `requires_action`
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<RunError>,
}

impl Run {
    pub fn new(id: impl Into<String>, thread_id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            status,
            tool_calls: Vec::new(),
            last_error: None,
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.status.phase()
    }
}
