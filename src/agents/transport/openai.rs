//! OpenAI Assistants v2 transport over reqwest

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::path::Path;
use std::time::{Duration, Instant};

use super::{
    AssistantDefinition, AssistantSummary, AssistantTransport, ChatCompletion, FileTransport,
};
use crate::agents::domain::{
    FileBatch, FileObject, MessageContent, NewMessage, Role, Run, RunError, RunStatus,
    ThreadMessage, ToolCall, ToolOutput, VectorStore, ASSISTANTS_PURPOSE,
};
use crate::agents::error::{TransportError, TransportResult};
use crate::config::AssistantApiSettings;

/// Page size used for list endpoints
const PAGE_LIMIT: u32 = 100;

/// Number of messages fetched when reading a completed turn
const MESSAGE_LIMIT: u32 = 20;

/// OpenAI Assistants API client
pub struct OpenAiAssistantsClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl OpenAiAssistantsClient {
    /// Create a client from settings, reading the API key from the configured
    /// environment variable
    pub fn new(settings: &AssistantApiSettings) -> TransportResult<Self> {
        let api_key = env::var(&settings.api_key_env).map_err(|_| {
            TransportError::Authentication(format!(
                "Environment variable {} not set",
                settings.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key: SecretString::from(api_key),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            poll_timeout: Duration::from_secs(settings.poll_timeout_seconds),
        })
    }

    /// Create a client with an explicit key and endpoint
    pub fn with_api_key(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(500),
            poll_timeout: Duration::from_secs(120),
        }
    }

    /// Override the polling cadence
    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> TransportResult<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TransportError::Authentication(message));
        }
        Err(TransportError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> TransportResult<T> {
        let response = self.send(self.request(reqwest::Method::GET, path)).await?;
        response
            .json()
            .await
            .map_err(|e| TransportError::Parse(format!("Failed to parse response: {}", e)))
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> TransportResult<T> {
        let response = self
            .send(self.request(reqwest::Method::POST, path).json(body))
            .await?;
        response
            .json()
            .await
            .map_err(|e| TransportError::Parse(format!("Failed to parse response: {}", e)))
    }

    /// Follow `after` cursors until the listing is exhausted
    async fn list_all<T>(&self, path: &str) -> TransportResult<Vec<T>>
    where
        T: DeserializeOwned + HasId,
    {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let url = match &after {
                Some(cursor) => format!("{}?limit={}&after={}", path, PAGE_LIMIT, cursor),
                None => format!("{}?limit={}", path, PAGE_LIMIT),
            };
            let page: ListResponse<T> = self.get_json(&url).await?;
            let next = page.data.last().map(|item| item.id().to_string());
            items.extend(page.data);

            match (page.has_more, next) {
                (true, Some(cursor)) => after = Some(cursor),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> TransportResult<Run> {
        let run: WireRun = self
            .get_json(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .await?;
        Ok(run.into())
    }

    /// Poll until the run leaves the pending states or the poll timeout expires.
    /// On timeout the last observed run is returned as-is.
    async fn wait_for_run(&self, mut run: Run) -> TransportResult<Run> {
        let started = Instant::now();
        while run.status.is_pending() {
            if started.elapsed() >= self.poll_timeout {
                tracing::warn!(
                    run_id = %run.id,
                    status = %run.status,
                    "Run still pending after {:?}",
                    self.poll_timeout
                );
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
            run = self.retrieve_run(&run.thread_id, &run.id).await?;
        }
        Ok(run)
    }

    fn tool_resources(knowledge_store_id: Option<&str>) -> Value {
        match knowledge_store_id {
            Some(id) => json!({ "file_search": { "vector_store_ids": [id] } }),
            None => json!({}),
        }
    }

    fn assistant_body(definition: &AssistantDefinition) -> Value {
        let mut body = json!({
            "name": definition.name,
            "instructions": definition.instructions,
            "model": definition.model,
            "tools": definition.tools,
        });
        if let Some(store) = &definition.knowledge_store_id {
            body["tool_resources"] = Self::tool_resources(Some(store));
        }
        body
    }
}

#[async_trait]
impl AssistantTransport for OpenAiAssistantsClient {
    async fn list_assistants(&self) -> TransportResult<Vec<AssistantSummary>> {
        self.list_all("/assistants").await
    }

    async fn create_assistant(&self, definition: &AssistantDefinition) -> TransportResult<String> {
        let created: IdOnly = self
            .post_json("/assistants", &Self::assistant_body(definition))
            .await?;
        Ok(created.id)
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        definition: &AssistantDefinition,
    ) -> TransportResult<()> {
        let _: IdOnly = self
            .post_json(
                &format!("/assistants/{}", assistant_id),
                &Self::assistant_body(definition),
            )
            .await?;
        Ok(())
    }

    async fn create_thread(&self, knowledge_store_id: Option<&str>) -> TransportResult<String> {
        let body = json!({ "tool_resources": Self::tool_resources(knowledge_store_id) });
        let thread: IdOnly = self.post_json("/threads", &body).await?;
        Ok(thread.id)
    }

    async fn update_thread(&self, thread_id: &str, knowledge_store_id: &str) -> TransportResult<()> {
        let body = json!({ "tool_resources": Self::tool_resources(Some(knowledge_store_id)) });
        let _: IdOnly = self
            .post_json(&format!("/threads/{}", thread_id), &body)
            .await?;
        Ok(())
    }

    async fn create_message(&self, thread_id: &str, message: &NewMessage) -> TransportResult<String> {
        let attachments: Vec<Value> = message
            .attachments
            .iter()
            .map(|file_id| json!({ "file_id": file_id, "tools": [{ "type": "file_search" }] }))
            .collect();
        let body = json!({
            "role": "user",
            "content": message.content,
            "attachments": attachments,
        });
        let created: IdOnly = self
            .post_json(&format!("/threads/{}/messages", thread_id), &body)
            .await?;
        Ok(created.id)
    }

    async fn create_run_and_poll(&self, thread_id: &str, assistant_id: &str) -> TransportResult<Run> {
        let run: WireRun = self
            .post_json(
                &format!("/threads/{}/runs", thread_id),
                &json!({ "assistant_id": assistant_id }),
            )
            .await?;
        self.wait_for_run(run.into()).await
    }

    async fn poll_run(&self, thread_id: &str, run_id: &str) -> TransportResult<Run> {
        let run = self.retrieve_run(thread_id, run_id).await?;
        self.wait_for_run(run).await
    }

    async fn submit_tool_outputs_and_poll(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> TransportResult<Run> {
        let run: WireRun = self
            .post_json(
                &format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
                &json!({ "tool_outputs": outputs }),
            )
            .await?;
        self.wait_for_run(run.into()).await
    }

    async fn list_messages(&self, thread_id: &str) -> TransportResult<Vec<ThreadMessage>> {
        let page: ListResponse<WireMessage> = self
            .get_json(&format!(
                "/threads/{}/messages?order=desc&limit={}",
                thread_id, MESSAGE_LIMIT
            ))
            .await?;
        Ok(page.data.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl FileTransport for OpenAiAssistantsClient {
    async fn list_files(&self) -> TransportResult<Vec<FileObject>> {
        self.list_all("/files").await
    }

    async fn file_content(&self, file_id: &str) -> TransportResult<Bytes> {
        let response = self
            .send(self.request(reqwest::Method::GET, &format!("/files/{}/content", file_id)))
            .await?;
        Ok(response.bytes().await?)
    }

    async fn upload_file(&self, path: &Path) -> TransportResult<FileObject> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| TransportError::File(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = reqwest::multipart::Part::bytes(content)
            .file_name(file_name)
            .mime_str(mime.essence_str())?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", ASSISTANTS_PURPOSE)
            .part("file", part);

        let response = self
            .send(self.request(reqwest::Method::POST, "/files").multipart(form))
            .await?;
        response
            .json()
            .await
            .map_err(|e| TransportError::Parse(format!("Failed to parse upload response: {}", e)))
    }

    async fn delete_file(&self, file_id: &str) -> TransportResult<()> {
        self.send(self.request(reqwest::Method::DELETE, &format!("/files/{}", file_id)))
            .await?;
        Ok(())
    }

    async fn list_vector_stores(&self) -> TransportResult<Vec<VectorStore>> {
        let stores: Vec<WireVectorStore> = self.list_all("/vector_stores").await?;
        Ok(stores.into_iter().map(Into::into).collect())
    }

    async fn create_vector_store(&self, name: &str) -> TransportResult<VectorStore> {
        let store: WireVectorStore = self
            .post_json("/vector_stores", &json!({ "name": name }))
            .await?;
        Ok(store.into())
    }

    async fn list_vector_store_files(&self, store_id: &str) -> TransportResult<Vec<String>> {
        let files: Vec<IdOnly> = self
            .list_all(&format!("/vector_stores/{}/files", store_id))
            .await?;
        Ok(files.into_iter().map(|f| f.id).collect())
    }

    async fn create_file_batch_and_poll(
        &self,
        store_id: &str,
        file_ids: &[String],
    ) -> TransportResult<FileBatch> {
        let mut batch: WireFileBatch = self
            .post_json(
                &format!("/vector_stores/{}/file_batches", store_id),
                &json!({ "file_ids": file_ids }),
            )
            .await?;

        let started = Instant::now();
        while batch.status == "in_progress" && started.elapsed() < self.poll_timeout {
            tokio::time::sleep(self.poll_interval).await;
            batch = self
                .get_json(&format!(
                    "/vector_stores/{}/file_batches/{}",
                    store_id, batch.id
                ))
                .await?;
        }

        Ok(batch.into())
    }
}

#[async_trait]
impl ChatCompletion for OpenAiAssistantsClient {
    async fn complete(&self, model: &str, prompt: &str) -> TransportResult<String> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
        });
        let response: WireChatResponse = self.post_json("/chat/completions", &body).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TransportError::Parse("No completion choices returned".to_string()))
    }
}

// Wire format

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

impl HasId for IdOnly {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for AssistantSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for FileObject {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize)]
struct WireVectorStore {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl HasId for WireVectorStore {
    fn id(&self) -> &str {
        &self.id
    }
}

impl From<WireVectorStore> for VectorStore {
    fn from(store: WireVectorStore) -> Self {
        VectorStore {
            id: store.id,
            name: store.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireRun {
    id: String,
    thread_id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<WireRequiredAction>,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct WireRequiredAction {
    submit_tool_outputs: WireSubmitToolOutputs,
}

#[derive(Debug, Deserialize)]
struct WireSubmitToolOutputs {
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

impl From<WireRun> for Run {
    fn from(run: WireRun) -> Self {
        let tool_calls = run
            .required_action
            .map(|action| {
                action
                    .submit_tool_outputs
                    .tool_calls
                    .into_iter()
                    .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
                    .collect()
            })
            .unwrap_or_default();

        Run {
            id: run.id,
            thread_id: run.thread_id,
            status: run.status,
            tool_calls,
            last_error: run.last_error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    role: Role,
    #[serde(default)]
    content: Vec<WireContent>,
    #[serde(default)]
    attachments: Option<Vec<WireAttachment>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text { text: WireText },
    ImageFile { image_file: WireImageFile },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireText {
    value: String,
}

#[derive(Debug, Deserialize)]
struct WireImageFile {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    file_id: String,
}

impl From<WireMessage> for ThreadMessage {
    fn from(message: WireMessage) -> Self {
        let content = message
            .content
            .into_iter()
            .map(|c| match c {
                WireContent::Text { text } => MessageContent::text(text.value),
                WireContent::ImageFile { image_file } => MessageContent::image(image_file.file_id),
                WireContent::Other => MessageContent::Other,
            })
            .collect();

        ThreadMessage {
            id: message.id,
            role: message.role,
            content,
            attachments: message
                .attachments
                .unwrap_or_default()
                .into_iter()
                .map(|a| a.file_id)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChatMessage,
}

#[derive(Debug, Deserialize)]
struct WireChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFileBatch {
    id: String,
    status: String,
    #[serde(default)]
    file_counts: WireFileCounts,
}

#[derive(Debug, Default, Deserialize)]
struct WireFileCounts {
    #[serde(default)]
    completed: u32,
    #[serde(default)]
    failed: u32,
}

impl From<WireFileBatch> for FileBatch {
    fn from(batch: WireFileBatch) -> Self {
        FileBatch {
            id: batch.id,
            status: batch.status,
            completed: batch.file_counts.completed,
            failed: batch.file_counts.failed,
        }
    }
}
