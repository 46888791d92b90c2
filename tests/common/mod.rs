//! Scripted in-memory transport shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use hestia::agents::domain::{
    FileBatch, FileObject, MessageContent, NewMessage, Run, RunStatus, ThreadMessage, ToolCall,
    ToolOutput, VectorStore,
};
use hestia::agents::error::{TransportError, TransportResult};
use hestia::agents::transport::{
    AssistantDefinition, AssistantSummary, AssistantTransport, FileTransport,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const THREAD: &str = "thread_1";
pub const RUN: &str = "run_1";

pub fn requires_action(calls: Vec<ToolCall>) -> Run {
    Run::new(RUN, THREAD, RunStatus::RequiresAction).with_tool_calls(calls)
}

pub fn with_status(status: RunStatus) -> Run {
    Run::new(RUN, THREAD, status)
}

pub fn completed() -> Run {
    with_status(RunStatus::Completed)
}

pub fn answer(text: &str) -> ThreadMessage {
    ThreadMessage::assistant("msg_answer", vec![MessageContent::text(text)])
}

/// Transport that replays a script of run states.
///
/// Every run-returning call (start, poll, submit) takes the next scripted
/// state; the last state repeats forever once the script runs dry.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Run>>,
    messages: Mutex<Vec<ThreadMessage>>,
    files: Mutex<Vec<FileObject>>,
    fail_submissions: Mutex<u32>,
    fail_run_start: Mutex<bool>,
    run_gate: Option<Arc<Notify>>,

    pub threads_created: Mutex<Vec<Option<String>>>,
    pub posted: Mutex<Vec<NewMessage>>,
    pub submissions: Mutex<Vec<Vec<ToolOutput>>>,
    pub submit_attempts: Mutex<u32>,
    pub polls: Mutex<u32>,
    pub assistants: Mutex<Vec<AssistantSummary>>,
    pub created_assistants: Mutex<Vec<AssistantDefinition>>,
    pub updated_assistants: Mutex<Vec<(String, AssistantDefinition)>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Run>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn with_messages(self, messages: Vec<ThreadMessage>) -> Self {
        *self.messages.lock().unwrap() = messages;
        self
    }

    pub fn with_files(self, files: Vec<FileObject>) -> Self {
        *self.files.lock().unwrap() = files;
        self
    }

    pub fn failing_submissions(self, count: u32) -> Self {
        *self.fail_submissions.lock().unwrap() = count;
        self
    }

    pub fn failing_run_start(self) -> Self {
        *self.fail_run_start.lock().unwrap() = true;
        self
    }

    /// Hold every run start until `gate` is notified
    pub fn with_run_gate(mut self, gate: Arc<Notify>) -> Self {
        self.run_gate = Some(gate);
        self
    }

    fn next_run(&self) -> TransportResult<Run> {
        let mut script = self.script.lock().unwrap();
        match script.len() {
            0 => Err(TransportError::Network("script exhausted".into())),
            1 => Ok(script[0].clone()),
            _ => Ok(script.pop_front().unwrap()),
        }
    }

    pub fn submitted(&self) -> Vec<Vec<ToolOutput>> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssistantTransport for ScriptedTransport {
    async fn list_assistants(&self) -> TransportResult<Vec<AssistantSummary>> {
        Ok(self.assistants.lock().unwrap().clone())
    }

    async fn create_assistant(&self, definition: &AssistantDefinition) -> TransportResult<String> {
        let mut created = self.created_assistants.lock().unwrap();
        created.push(definition.clone());
        Ok(format!("asst_{}", created.len()))
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        definition: &AssistantDefinition,
    ) -> TransportResult<()> {
        self.updated_assistants
            .lock()
            .unwrap()
            .push((assistant_id.to_string(), definition.clone()));
        Ok(())
    }

    async fn create_thread(&self, knowledge_store_id: Option<&str>) -> TransportResult<String> {
        let mut created = self.threads_created.lock().unwrap();
        created.push(knowledge_store_id.map(str::to_string));
        Ok(format!("thread_{}", created.len()))
    }

    async fn update_thread(&self, _thread_id: &str, _store: &str) -> TransportResult<()> {
        Ok(())
    }

    async fn create_message(&self, _thread_id: &str, message: &NewMessage) -> TransportResult<String> {
        let mut posted = self.posted.lock().unwrap();
        posted.push(message.clone());
        Ok(format!("msg_{}", posted.len()))
    }

    async fn create_run_and_poll(&self, _thread_id: &str, _assistant_id: &str) -> TransportResult<Run> {
        if let Some(gate) = &self.run_gate {
            gate.notified().await;
        }
        if *self.fail_run_start.lock().unwrap() {
            return Err(TransportError::Api {
                status: 500,
                message: "server error".into(),
            });
        }
        self.next_run()
    }

    async fn poll_run(&self, _thread_id: &str, _run_id: &str) -> TransportResult<Run> {
        *self.polls.lock().unwrap() += 1;
        self.next_run()
    }

    async fn submit_tool_outputs_and_poll(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> TransportResult<Run> {
        *self.submit_attempts.lock().unwrap() += 1;
        {
            let mut failures = self.fail_submissions.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::Api {
                    status: 400,
                    message: "run is not awaiting tool outputs".into(),
                });
            }
        }
        self.submissions.lock().unwrap().push(outputs.to_vec());
        self.next_run()
    }

    async fn list_messages(&self, _thread_id: &str) -> TransportResult<Vec<ThreadMessage>> {
        Ok(self.messages.lock().unwrap().clone())
    }
}

#[async_trait]
impl FileTransport for ScriptedTransport {
    async fn list_files(&self) -> TransportResult<Vec<FileObject>> {
        Ok(self.files.lock().unwrap().clone())
    }

    async fn file_content(&self, file_id: &str) -> TransportResult<Bytes> {
        Err(TransportError::File(format!("no content for {}", file_id)))
    }

    async fn upload_file(&self, path: &Path) -> TransportResult<FileObject> {
        Err(TransportError::File(format!("uploads unsupported: {}", path.display())))
    }

    async fn delete_file(&self, _file_id: &str) -> TransportResult<()> {
        Ok(())
    }

    async fn list_vector_stores(&self) -> TransportResult<Vec<VectorStore>> {
        Ok(Vec::new())
    }

    async fn create_vector_store(&self, name: &str) -> TransportResult<VectorStore> {
        Ok(VectorStore {
            id: format!("vs_{}", name),
            name: name.to_string(),
        })
    }

    async fn list_vector_store_files(&self, _store_id: &str) -> TransportResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn create_file_batch_and_poll(
        &self,
        _store_id: &str,
        _file_ids: &[String],
    ) -> TransportResult<FileBatch> {
        Ok(FileBatch::default())
    }
}

/// In-memory file service for knowledge synchronization tests
#[derive(Default)]
pub struct MemoryFiles {
    pub stores: Mutex<Vec<VectorStore>>,
    /// store id -> file ids
    pub store_files: Mutex<HashMap<String, Vec<String>>>,
    pub uploads: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub contents: Mutex<HashMap<String, Bytes>>,
    pub files: Mutex<Vec<FileObject>>,
}

impl MemoryFiles {
    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileTransport for MemoryFiles {
    async fn list_files(&self) -> TransportResult<Vec<FileObject>> {
        Ok(self.files.lock().unwrap().clone())
    }

    async fn file_content(&self, file_id: &str) -> TransportResult<Bytes> {
        self.contents
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                status: 404,
                message: format!("No such file: {}", file_id),
            })
    }

    async fn upload_file(&self, path: &Path) -> TransportResult<FileObject> {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(name.clone());
        Ok(FileObject {
            id: format!("file-{}", uploads.len()),
            filename: name,
            purpose: "assistants".into(),
            bytes: 0,
        })
    }

    async fn delete_file(&self, file_id: &str) -> TransportResult<()> {
        self.deleted.lock().unwrap().push(file_id.to_string());
        for ids in self.store_files.lock().unwrap().values_mut() {
            ids.retain(|id| id != file_id);
        }
        Ok(())
    }

    async fn list_vector_stores(&self) -> TransportResult<Vec<VectorStore>> {
        Ok(self.stores.lock().unwrap().clone())
    }

    async fn create_vector_store(&self, name: &str) -> TransportResult<VectorStore> {
        let mut stores = self.stores.lock().unwrap();
        let store = VectorStore {
            id: format!("vs_{}", stores.len() + 1),
            name: name.to_string(),
        };
        stores.push(store.clone());
        Ok(store)
    }

    async fn list_vector_store_files(&self, store_id: &str) -> TransportResult<Vec<String>> {
        Ok(self
            .store_files
            .lock()
            .unwrap()
            .get(store_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_file_batch_and_poll(
        &self,
        store_id: &str,
        file_ids: &[String],
    ) -> TransportResult<FileBatch> {
        self.store_files
            .lock()
            .unwrap()
            .entry(store_id.to_string())
            .or_default()
            .extend(file_ids.iter().cloned());
        Ok(FileBatch {
            id: "batch_1".into(),
            status: "completed".into(),
            completed: file_ids.len() as u32,
            failed: 0,
        })
    }
}
