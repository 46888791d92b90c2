//! Turn outcome types

use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::agents::domain::RunStatus;

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The run completed with a textual answer
    Answered(String),
    /// The run completed but the newest message carried no usable text
    EmptyResponse,
    /// The run reached a status the engine does not handle
    ProtocolError(RunStatus),
    /// The iteration bound was reached before completion
    Exhausted { iterations: u32 },
    /// The transport failed outside of tool-output submission
    TransportFailure(String),
    /// The request was rejected before reaching the transport
    InvalidRequest(String),
}

impl TurnOutcome {
    /// Short label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Answered(_) => "answered",
            TurnOutcome::EmptyResponse => "empty_response",
            TurnOutcome::ProtocolError(_) => "protocol_error",
            TurnOutcome::Exhausted { .. } => "exhausted",
            TurnOutcome::TransportFailure(_) => "transport_failure",
            TurnOutcome::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// What happened to one tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DispatchStatus {
    /// An output was produced (possibly an `"Error: ..."` output)
    Dispatched,
    /// The argument payload could not be decoded
    DecodeFailed(String),
    /// The function name is not registered
    NotFound,
    /// The registry refused the call for another reason
    Failed(String),
}

impl DispatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchStatus::Dispatched => "dispatched",
            DispatchStatus::DecodeFailed(_) => "decode_failed",
            DispatchStatus::NotFound => "not_found",
            DispatchStatus::Failed(_) => "failed",
        }
    }
}

/// Record of one tool call dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRecord {
    pub call_id: String,
    pub function: String,
    pub iteration: u32,
    #[serde(flatten)]
    pub status: DispatchStatus,
}

/// Full account of one turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub turn_id: Uuid,
    pub session_id: String,
    pub outcome: TurnOutcome,
    /// Non-terminal state-machine steps taken
    pub iterations: u32,
    pub dispatches: Vec<DispatchRecord>,
    pub artifacts: Vec<PathBuf>,
}

impl TurnReport {
    pub(crate) fn new(turn_id: Uuid, session_id: &str) -> Self {
        Self {
            turn_id,
            session_id: session_id.to_string(),
            outcome: TurnOutcome::EmptyResponse,
            iterations: 0,
            dispatches: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Answered(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_answer(self) -> Option<String> {
        match self.outcome {
            TurnOutcome::Answered(text) => Some(text),
            _ => None,
        }
    }

    /// Number of dispatches that produced an output
    pub fn dispatched(&self) -> usize {
        self.dispatches
            .iter()
            .filter(|d| d.status == DispatchStatus::Dispatched)
            .count()
    }
}
