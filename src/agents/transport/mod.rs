//! Assistant transport
//!
//! The bridge talks to a hosted, stateful assistant through two ports:
//! - [`AssistantTransport`]: assistants, threads, messages, runs and tool outputs
//! - [`FileTransport`]: files, generated content and vector stores
//!
//! A third, stateless port, [`ChatCompletion`], serves one-shot prompts such as
//! knowledge-store routing.
//!
//! [`OpenAiAssistantsClient`] implements all three against the OpenAI REST API.

mod openai;

pub use openai::OpenAiAssistantsClient;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::agents::domain::{
    FileBatch, FileObject, NewMessage, Run, ThreadMessage, ToolDescriptor, ToolOutput, VectorStore,
};
use crate::agents::error::TransportResult;

/// Port for the conversational side of the assistant API
#[async_trait]
pub trait AssistantTransport: Send + Sync {
    /// List assistants visible to the account
    async fn list_assistants(&self) -> TransportResult<Vec<AssistantSummary>>;

    /// Create an assistant, returning its id
    async fn create_assistant(&self, definition: &AssistantDefinition) -> TransportResult<String>;

    /// Replace an existing assistant's definition
    async fn update_assistant(
        &self,
        assistant_id: &str,
        definition: &AssistantDefinition,
    ) -> TransportResult<()>;

    /// Create a thread, optionally with a knowledge store bound for file search
    async fn create_thread(&self, knowledge_store_id: Option<&str>) -> TransportResult<String>;

    /// Rebind a thread's knowledge store
    async fn update_thread(&self, thread_id: &str, knowledge_store_id: &str) -> TransportResult<()>;

    /// Post a user message on a thread, returning the message id
    async fn create_message(&self, thread_id: &str, message: &NewMessage) -> TransportResult<String>;

    /// Start a run and wait until it leaves the queued/in-progress states
    async fn create_run_and_poll(&self, thread_id: &str, assistant_id: &str) -> TransportResult<Run>;

    /// Fetch the current state of a run, waiting while it is pending
    async fn poll_run(&self, thread_id: &str, run_id: &str) -> TransportResult<Run>;

    /// Submit all outputs of one `requires_action` episode and wait for the next state
    async fn submit_tool_outputs_and_poll(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> TransportResult<Run>;

    /// List the thread's messages, newest first
    async fn list_messages(&self, thread_id: &str) -> TransportResult<Vec<ThreadMessage>>;
}

/// Port for files and vector stores
#[async_trait]
pub trait FileTransport: Send + Sync {
    /// List all files
    async fn list_files(&self) -> TransportResult<Vec<FileObject>>;

    /// Download a file's content
    async fn file_content(&self, file_id: &str) -> TransportResult<Bytes>;

    /// Upload a local file with the `assistants` purpose
    async fn upload_file(&self, path: &Path) -> TransportResult<FileObject>;

    /// Delete a file
    async fn delete_file(&self, file_id: &str) -> TransportResult<()>;

    /// List vector stores
    async fn list_vector_stores(&self) -> TransportResult<Vec<VectorStore>>;

    /// Create a vector store
    async fn create_vector_store(&self, name: &str) -> TransportResult<VectorStore>;

    /// List the ids of files attached to a vector store
    async fn list_vector_store_files(&self, store_id: &str) -> TransportResult<Vec<String>>;

    /// Attach uploaded files to a vector store and wait for indexing
    async fn create_file_batch_and_poll(
        &self,
        store_id: &str,
        file_ids: &[String],
    ) -> TransportResult<FileBatch>;
}

/// Port for single-shot chat completions outside any thread
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send one user prompt and return the reply text
    async fn complete(&self, model: &str, prompt: &str) -> TransportResult<String>;
}

/// Assistant as listed by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Built-in and function tools the assistant is given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantTool {
    CodeInterpreter,
    FileSearch,
    Function { function: ToolDescriptor },
}

/// Full assistant definition pushed on create/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantDefinition {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<AssistantTool>,
    /// Knowledge store searched by default for every thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_store_id: Option<String>,
}
