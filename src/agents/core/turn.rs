//! Turn engine: one user message in, at most one answer out

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use super::report::{DispatchRecord, DispatchStatus, TurnOutcome, TurnReport};
use crate::agents::artifacts::ArtifactSink;
use crate::agents::codec::decode_arguments;
use crate::agents::domain::{NewMessage, Run, RunPhase, ToolCall, ToolOutput};
use crate::agents::error::AgentError;
use crate::agents::knowledge::SharedCatalog;
use crate::agents::registry::FunctionRegistry;
use crate::agents::selector::StoreSelector;
use crate::agents::session::{Session, SessionManager};
use crate::agents::transport::{AssistantTransport, FileTransport};

/// Default bound on non-terminal state-machine steps per turn
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_iterations: u32,
    /// Attach every uploaded `assistants` file to each user message
    pub attach_uploaded_files: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            attach_uploaded_files: false,
        }
    }
}

/// A user message addressed to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub session_id: String,
    pub message: String,
    /// Knowledge store id, or a store name known to the catalog
    pub knowledge_store: Option<String>,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            knowledge_store: None,
        }
    }

    pub fn with_knowledge_store(mut self, store: Option<&str>) -> Self {
        self.knowledge_store = store.map(str::to_string);
        self
    }
}

/// State of the run as the engine tracks it
enum TurnState {
    Pending(Run),
    RequiresAction(Run),
    Completed(Run),
    Unexpected(Run),
}

impl From<Run> for TurnState {
    fn from(run: Run) -> Self {
        match run.phase() {
            RunPhase::Pending => TurnState::Pending(run),
            RunPhase::RequiresAction => TurnState::RequiresAction(run),
            RunPhase::Completed => TurnState::Completed(run),
            RunPhase::Unexpected => TurnState::Unexpected(run),
        }
    }
}

/// Drives conversation turns against a hosted assistant
pub struct TurnEngine {
    transport: Arc<dyn AssistantTransport>,
    sessions: Arc<SessionManager>,
    registry: Arc<FunctionRegistry>,
    assistant_id: String,
    config: EngineConfig,
    catalog: Option<SharedCatalog>,
    artifacts: Option<Arc<dyn ArtifactSink>>,
    uploads: Option<Arc<dyn FileTransport>>,
    selector: Option<Arc<dyn StoreSelector>>,
}

impl TurnEngine {
    pub fn new(
        transport: Arc<dyn AssistantTransport>,
        sessions: Arc<SessionManager>,
        registry: Arc<FunctionRegistry>,
        assistant_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            sessions,
            registry,
            assistant_id: assistant_id.into(),
            config: EngineConfig::default(),
            catalog: None,
            artifacts: None,
            uploads: None,
            selector: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve knowledge store names through a catalog
    pub fn with_catalog(mut self, catalog: SharedCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Collect generated files after each completed run
    pub fn with_artifacts(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.artifacts = Some(sink);
        self
    }

    /// Source of uploaded files for message attachments
    pub fn with_uploads(mut self, files: Arc<dyn FileTransport>) -> Self {
        self.uploads = Some(files);
        self
    }

    /// Pick a catalog store for messages that name none
    pub fn with_selector(mut self, selector: Arc<dyn StoreSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Name of the catalog store most relevant to `message`.
    ///
    /// `None` without a selector, with an empty catalog, or when nothing fits.
    pub async fn select_store(&self, message: &str) -> Option<String> {
        let (Some(selector), Some(catalog)) = (&self.selector, &self.catalog) else {
            return None;
        };
        let stores = catalog.read().await.names();
        if stores.is_empty() {
            return None;
        }
        let selected = selector.select(message, &stores).await;
        tracing::info!("Vector store: {:?}", selected);
        selected
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one turn and return the answer, if any
    pub async fn run_turn(
        &self,
        session_id: &str,
        message: &str,
        knowledge_store_id: Option<&str>,
    ) -> Option<String> {
        let request = TurnRequest::new(session_id, message).with_knowledge_store(knowledge_store_id);
        self.execute(request).await.into_answer()
    }

    /// Run one turn and report how it went. Never panics or errors.
    pub async fn execute(&self, request: TurnRequest) -> TurnReport {
        let turn_id = Uuid::new_v4();
        let span = tracing::info_span!("turn", %turn_id, session = %request.session_id);
        self.execute_inner(turn_id, request).instrument(span).await
    }

    async fn execute_inner(&self, turn_id: Uuid, request: TurnRequest) -> TurnReport {
        let start = Instant::now();
        let mut report = TurnReport::new(turn_id, &request.session_id);

        if request.message.trim().is_empty() {
            report.outcome = TurnOutcome::InvalidRequest("message is empty".into());
            return report;
        }
        tracing::info!("Received message: {}", request.message);

        let store_id = match &request.knowledge_store {
            Some(store) => Some(self.resolve_store(store).await),
            None => None,
        };

        let session = match self.sessions.resolve(&request.session_id, store_id.as_deref()).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Failed to resolve session: {}", e);
                report.outcome = TurnOutcome::TransportFailure(e.to_string());
                return report;
            }
        };

        let _turn_guard = session.lock_turn().await;
        let outcome = match self.start_run(&session, &request.message).await {
            Ok(run) => self.drive(run, &mut report).await,
            Err(e) => {
                tracing::error!("Failed to start run: {}", e);
                TurnOutcome::TransportFailure(e.to_string())
            }
        };
        report.outcome = outcome;

        tracing::info!(
            outcome = report.outcome.label(),
            iterations = report.iterations,
            dispatched = report.dispatched(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Turn finished"
        );
        report
    }

    async fn resolve_store(&self, store: &str) -> String {
        match &self.catalog {
            Some(catalog) => catalog.read().await.resolve(store),
            None => store.to_string(),
        }
    }

    async fn start_run(&self, session: &Session, message: &str) -> Result<Run, AgentError> {
        let message = NewMessage::user(message).with_attachments(self.upload_attachments().await);
        self.transport.create_message(&session.thread_id, &message).await?;
        let run = self
            .transport
            .create_run_and_poll(&session.thread_id, &self.assistant_id)
            .await?;
        tracing::debug!(run = %run.id, status = %run.status, "Run started");
        Ok(run)
    }

    /// Step the run through the state machine until it ends or the bound is hit.
    ///
    /// Only non-terminal steps count; a completion reached on the final step
    /// is still honored.
    async fn drive(&self, run: Run, report: &mut TurnReport) -> TurnOutcome {
        let mut state = TurnState::from(run);
        loop {
            match state {
                TurnState::Completed(run) => return self.complete(&run, report).await,
                TurnState::Unexpected(run) => {
                    tracing::error!(
                        run = %run.id,
                        status = %run.status,
                        error = ?run.last_error,
                        "Run ended in unexpected status"
                    );
                    return TurnOutcome::ProtocolError(run.status);
                }
                TurnState::RequiresAction(run) | TurnState::Pending(run)
                    if report.iterations >= self.config.max_iterations =>
                {
                    tracing::warn!(
                        run = %run.id,
                        status = %run.status,
                        "Run did not complete within {} iterations",
                        self.config.max_iterations
                    );
                    return TurnOutcome::Exhausted {
                        iterations: report.iterations,
                    };
                }
                TurnState::RequiresAction(run) => {
                    report.iterations += 1;
                    state = self.handle_requires_action(run, report).await;
                }
                TurnState::Pending(run) => {
                    report.iterations += 1;
                    state = self.refresh(run).await;
                }
            }
        }
    }

    async fn handle_requires_action(&self, run: Run, report: &mut TurnReport) -> TurnState {
        let outputs = self.dispatch(&run.tool_calls, report).await;

        if outputs.is_empty() {
            tracing::info!(run = %run.id, "No tool outputs to submit");
            return self.refresh(run).await;
        }

        tracing::debug!(run = %run.id, "Submitting {} tool outputs", outputs.len());
        match self
            .transport
            .submit_tool_outputs_and_poll(&run.thread_id, &run.id, &outputs)
            .await
        {
            Ok(next) => TurnState::from(next),
            Err(e) => {
                tracing::warn!(run = %run.id, "Failed to submit tool outputs: {}", e);
                self.refresh(run).await
            }
        }
    }

    /// Execute each tool call in order; failures are skipped, not fatal
    async fn dispatch(&self, calls: &[ToolCall], report: &mut TurnReport) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let status = match decode_arguments(&call.arguments) {
                Err(e) => {
                    tracing::warn!(function = %call.name, call_id = %call.id, "Failed to decode arguments: {}", e);
                    DispatchStatus::DecodeFailed(e.to_string())
                }
                Ok(args) => {
                    tracing::debug!(function = %call.name, "Function args: {:?}", args);
                    match self.registry.invoke(&call.name, args).await {
                        Ok(output) => {
                            outputs.push(ToolOutput::new(&call.id, output));
                            DispatchStatus::Dispatched
                        }
                        Err(AgentError::FunctionNotFound(_)) => {
                            tracing::warn!(function = %call.name, call_id = %call.id, "Function not registered; skipping");
                            DispatchStatus::NotFound
                        }
                        Err(e) => {
                            tracing::warn!(function = %call.name, call_id = %call.id, "Failed to run function: {}", e);
                            DispatchStatus::Failed(e.to_string())
                        }
                    }
                }
            };
            report.dispatches.push(DispatchRecord {
                call_id: call.id.clone(),
                function: call.name.clone(),
                iteration: report.iterations,
                status,
            });
        }
        outputs
    }

    /// Fetch the run's current state; on failure the previous state is kept
    async fn refresh(&self, run: Run) -> TurnState {
        match self.transport.poll_run(&run.thread_id, &run.id).await {
            Ok(next) => TurnState::from(next),
            Err(e) => {
                tracing::warn!(run = %run.id, "Failed to refresh run: {}", e);
                TurnState::from(run)
            }
        }
    }

    async fn complete(&self, run: &Run, report: &mut TurnReport) -> TurnOutcome {
        let messages = match self.transport.list_messages(&run.thread_id).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(run = %run.id, "Failed to list messages: {}", e);
                return TurnOutcome::TransportFailure(e.to_string());
            }
        };

        if let Some(sink) = &self.artifacts {
            report.artifacts = sink.collect(&messages).await;
        }

        let Some(latest) = messages.first() else {
            tracing::warn!(run = %run.id, "Run completed without any messages");
            return TurnOutcome::EmptyResponse;
        };
        match latest.response_text() {
            Some(text) => {
                tracing::info!("Response: {}", text);
                TurnOutcome::Answered(text.to_string())
            }
            None => {
                tracing::warn!(message = %latest.id, "Latest message has no text response");
                TurnOutcome::EmptyResponse
            }
        }
    }

    async fn upload_attachments(&self) -> Vec<String> {
        let Some(files) = self.uploads.as_ref().filter(|_| self.config.attach_uploaded_files) else {
            return Vec::new();
        };
        match files.list_files().await {
            Ok(files) => files
                .into_iter()
                .filter(|f| f.is_user_upload())
                .map(|f| f.id)
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to list uploaded files: {}", e);
                Vec::new()
            }
        }
    }
}
