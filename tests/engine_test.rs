mod common;

use common::*;
use async_trait::async_trait;
use hestia::agents::artifacts::ArtifactSink;
use hestia::agents::codec::Arguments;
use hestia::agents::core::{DispatchStatus, EngineConfig, TurnEngine, TurnOutcome, TurnRequest};
use hestia::agents::domain::{FileObject, MessageContent, RunStatus, ThreadMessage, ToolCall, ToolOutput};
use hestia::agents::knowledge::{KnowledgeCatalog, SharedCatalog};
use hestia::agents::registry::FunctionRegistry;
use hestia::agents::selector::KeywordSelector;
use hestia::agents::session::SessionManager;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

type Calls = Arc<Mutex<Vec<Arguments>>>;

fn registry(calls: Calls) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry
        .register_fn("control_lights", move |args: Arguments| {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(args);
                Ok(json!("ok"))
            }
        })
        .register_fn("desk_height", |_args: Arguments| async move {
            Err(anyhow::anyhow!("desk controller offline"))
        })
        .register_fn("echo_room", |args: Arguments| async move {
            Ok(args.get("room").cloned().unwrap_or(Value::Null))
        });
    registry
}

fn engine(transport: Arc<ScriptedTransport>, calls: Calls) -> TurnEngine {
    let sessions = Arc::new(SessionManager::new(transport.clone()));
    TurnEngine::new(transport, sessions, Arc::new(registry(calls)), "asst_home")
}

fn lights_call(id: &str) -> ToolCall {
    ToolCall::new(
        id,
        "control_lights",
        r#"{"pattern": "light\\.kitchen_.*", "action": "turn_on"}"#,
    )
}

#[tokio::test]
async fn test_turn_on_kitchen_lights() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![requires_action(vec![lights_call("call_1")]), completed()])
            .with_messages(vec![answer("Done.")]),
    );
    let calls = Calls::default();
    let engine = engine(transport.clone(), calls.clone());

    let response = engine.run_turn("main", "turn on the kitchen lights", None).await;

    assert_eq!(response.as_deref(), Some("Done."));
    assert_eq!(transport.submitted(), vec![vec![ToolOutput::new("call_1", "ok")]]);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["pattern"], json!(r"light\.kitchen_.*"));
    assert_eq!(calls[0]["action"], json!("turn_on"));
}

#[tokio::test]
async fn test_unknown_function_is_skipped() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![
            requires_action(vec![
                lights_call("call_1"),
                ToolCall::new("call_2", "delete_universe", "{}"),
            ]),
            completed(),
        ])
        .with_messages(vec![answer("Lights are on.")]),
    );
    let engine = engine(transport.clone(), Calls::default());

    let report = engine.execute(TurnRequest::new("main", "lights please")).await;

    assert_eq!(report.answer(), Some("Lights are on."));
    assert_eq!(transport.submitted(), vec![vec![ToolOutput::new("call_1", "ok")]]);
    assert_eq!(report.dispatches.len(), 2);
    assert_eq!(report.dispatches[1].function, "delete_universe");
    assert_eq!(report.dispatches[1].status, DispatchStatus::NotFound);
}

#[tokio::test]
async fn test_iteration_bound_yields_no_answer() {
    // requires_action forever
    let transport = Arc::new(ScriptedTransport::new(vec![requires_action(vec![lights_call(
        "call_1",
    )])]));
    let calls = Calls::default();
    let engine = engine(transport.clone(), calls.clone());

    let report = engine.execute(TurnRequest::new("main", "loop")).await;

    assert_eq!(report.outcome, TurnOutcome::Exhausted { iterations: 20 });
    assert_eq!(report.iterations, 20);
    assert_eq!(transport.submitted().len(), 20);
    assert_eq!(calls.lock().unwrap().len(), 20);
}

#[tokio::test]
async fn test_run_turn_returns_none_when_exhausted() {
    let transport = Arc::new(ScriptedTransport::new(vec![with_status(RunStatus::InProgress)]));
    let engine = engine(transport.clone(), Calls::default()).with_config(EngineConfig {
        max_iterations: 3,
        ..Default::default()
    });

    assert_eq!(engine.run_turn("main", "still thinking?", None).await, None);
    assert_eq!(*transport.polls.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_completion_on_final_iteration_is_honored() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![requires_action(vec![lights_call("call_1")]), completed()])
            .with_messages(vec![answer("Done.")]),
    );
    let engine = engine(transport, Calls::default()).with_config(EngineConfig {
        max_iterations: 1,
        ..Default::default()
    });

    let report = engine.execute(TurnRequest::new("main", "lights")).await;
    assert_eq!(report.answer(), Some("Done."));
    assert_eq!(report.iterations, 1);
}

#[tokio::test]
async fn test_function_error_becomes_error_output() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![
            requires_action(vec![
                ToolCall::new("call_1", "desk_height", r#"{"height": 110}"#),
                lights_call("call_2"),
            ]),
            completed(),
        ])
        .with_messages(vec![answer("The desk is offline, lights are on.")]),
    );
    let engine = engine(transport.clone(), Calls::default());

    let response = engine.run_turn("main", "raise the desk and light the office", None).await;

    assert!(response.is_some());
    assert_eq!(
        transport.submitted(),
        vec![vec![
            ToolOutput::new("call_1", "Error: desk controller offline"),
            ToolOutput::new("call_2", "ok"),
        ]]
    );
}

#[tokio::test]
async fn test_unexpected_status_yields_no_answer() {
    for status in [RunStatus::Failed, RunStatus::Cancelled, RunStatus::Expired] {
        let transport = Arc::new(
            ScriptedTransport::new(vec![with_status(status.clone())])
                .with_messages(vec![answer("should not be read")]),
        );
        let engine = engine(transport.clone(), Calls::default());

        let report = engine.execute(TurnRequest::new("main", "hello")).await;

        assert_eq!(report.outcome, TurnOutcome::ProtocolError(status));
        assert!(transport.submitted().is_empty());
    }
}

#[tokio::test]
async fn test_empty_batch_is_not_submitted() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![
            requires_action(vec![ToolCall::new("call_1", "delete_universe", "{}")]),
            completed(),
        ])
        .with_messages(vec![answer("I can't do that.")]),
    );
    let engine = engine(transport.clone(), Calls::default());

    let report = engine.execute(TurnRequest::new("main", "delete everything")).await;

    assert_eq!(report.answer(), Some("I can't do that."));
    assert_eq!(*transport.submit_attempts.lock().unwrap(), 0);
    assert_eq!(*transport.polls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_failed_submission_continues_with_next_iteration() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![
            requires_action(vec![lights_call("call_1")]),
            requires_action(vec![lights_call("call_1")]),
            completed(),
        ])
        .with_messages(vec![answer("Done.")])
        .failing_submissions(1),
    );
    let engine = engine(transport.clone(), Calls::default());

    let report = engine.execute(TurnRequest::new("main", "lights")).await;

    assert_eq!(report.answer(), Some("Done."));
    assert_eq!(report.iterations, 2);
    assert_eq!(*transport.submit_attempts.lock().unwrap(), 2);
    assert_eq!(transport.submitted().len(), 1);
}

#[tokio::test]
async fn test_undecodable_arguments_are_skipped() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![
            requires_action(vec![
                ToolCall::new("call_1", "control_lights", "{not json"),
                ToolCall::new("call_2", "echo_room", r#"{"room": "office"}"#),
            ]),
            completed(),
        ])
        .with_messages(vec![answer("ok")]),
    );
    let engine = engine(transport.clone(), Calls::default());

    let report = engine.execute(TurnRequest::new("main", "hi")).await;

    assert_eq!(transport.submitted(), vec![vec![ToolOutput::new("call_2", "office")]]);
    assert!(matches!(report.dispatches[0].status, DispatchStatus::DecodeFailed(_)));
}

#[tokio::test]
async fn test_list_payload_invokes_once_per_entry() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![
            requires_action(vec![ToolCall::new(
                "call_1",
                "echo_room",
                r#"[{"room": "kitchen"}, {"room": "office"}]"#,
            )]),
            completed(),
        ])
        .with_messages(vec![answer("Both rooms done.")]),
    );
    let engine = engine(transport.clone(), Calls::default());

    engine.run_turn("main", "both rooms", None).await;

    assert_eq!(
        transport.submitted(),
        vec![vec![ToolOutput::new("call_1", r#"["kitchen","office"]"#)]]
    );
}

#[tokio::test]
async fn test_pending_run_is_refreshed() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![with_status(RunStatus::Queued), completed()])
            .with_messages(vec![answer("Hello!")]),
    );
    let engine = engine(transport.clone(), Calls::default());

    let report = engine.execute(TurnRequest::new("main", "hi")).await;

    assert_eq!(report.answer(), Some("Hello!"));
    assert_eq!(report.iterations, 1);
}

#[tokio::test]
async fn test_image_response_uses_caption() {
    let transport = Arc::new(ScriptedTransport::new(vec![completed()]).with_messages(vec![
        ThreadMessage::assistant(
            "msg_1",
            vec![
                MessageContent::image("file-chart"),
                MessageContent::text("Here is today's energy usage."),
            ],
        ),
    ]));
    let engine = engine(transport, Calls::default());

    assert_eq!(
        engine.run_turn("main", "chart my energy usage", None).await.as_deref(),
        Some("Here is today's energy usage.")
    );
}

#[tokio::test]
async fn test_image_without_caption_yields_no_answer() {
    let transport = Arc::new(ScriptedTransport::new(vec![completed()]).with_messages(vec![
        ThreadMessage::assistant("msg_1", vec![MessageContent::image("file-chart")]),
    ]));
    let engine = engine(transport, Calls::default());

    let report = engine.execute(TurnRequest::new("main", "chart")).await;
    assert_eq!(report.outcome, TurnOutcome::EmptyResponse);
}

#[tokio::test]
async fn test_run_start_failure_is_reported() {
    let transport = Arc::new(ScriptedTransport::new(vec![completed()]).failing_run_start());
    let engine = engine(transport, Calls::default());

    let report = engine.execute(TurnRequest::new("main", "hi")).await;
    assert!(matches!(report.outcome, TurnOutcome::TransportFailure(_)));
    assert_eq!(report.answer(), None);
}

#[tokio::test]
async fn test_empty_message_is_rejected_before_transport() {
    let transport = Arc::new(ScriptedTransport::new(vec![completed()]));
    let engine = engine(transport.clone(), Calls::default());

    let report = engine.execute(TurnRequest::new("main", "   ")).await;

    assert!(matches!(report.outcome, TurnOutcome::InvalidRequest(_)));
    assert!(transport.posted.lock().unwrap().is_empty());
    assert!(transport.threads_created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_knowledge_store_name_is_resolved() {
    let transport = Arc::new(ScriptedTransport::new(vec![completed()]).with_messages(vec![answer("ok")]));
    let mut catalog = KnowledgeCatalog::new();
    catalog.insert("user_preferences", "vs_prefs");
    let catalog: SharedCatalog = Arc::new(RwLock::new(catalog));
    let engine = engine(transport.clone(), Calls::default()).with_catalog(catalog);

    engine.run_turn("main", "what do I like?", Some("user_preferences")).await;
    engine.run_turn("guest", "hi", Some("vs_other")).await;

    assert_eq!(
        *transport.threads_created.lock().unwrap(),
        vec![Some("vs_prefs".to_string()), Some("vs_other".to_string())]
    );
}

#[tokio::test]
async fn test_select_store_needs_selector_and_catalog() {
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let mut catalog = KnowledgeCatalog::new();
    catalog.insert("user_preferences", "vs_prefs");
    let catalog: SharedCatalog = Arc::new(RwLock::new(catalog));
    let message = "change my user preferences";

    let bare = engine(transport.clone(), Calls::default()).with_catalog(catalog.clone());
    assert_eq!(bare.select_store(message).await, None);

    let no_catalog = engine(transport.clone(), Calls::default())
        .with_selector(Arc::new(KeywordSelector::default()));
    assert_eq!(no_catalog.select_store(message).await, None);

    let routed = engine(transport.clone(), Calls::default())
        .with_catalog(catalog.clone())
        .with_selector(Arc::new(KeywordSelector::default()));
    assert_eq!(routed.select_store(message).await.as_deref(), Some("user_preferences"));

    *catalog.write().await = KnowledgeCatalog::new();
    assert_eq!(routed.select_store(message).await, None);
}

#[tokio::test]
async fn test_sessions_reuse_threads() {
    let transport = Arc::new(ScriptedTransport::new(vec![completed()]).with_messages(vec![answer("ok")]));
    let engine = engine(transport.clone(), Calls::default());

    engine.run_turn("main", "one", None).await;
    engine.run_turn("main", "two", None).await;

    assert_eq!(transport.threads_created.lock().unwrap().len(), 1);
    assert_eq!(transport.posted.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_uploaded_files_are_attached_when_enabled() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![completed()])
            .with_messages(vec![answer("ok")])
            .with_files(vec![
                FileObject {
                    id: "file-prefs".into(),
                    filename: "prefs.md".into(),
                    purpose: "assistants".into(),
                    bytes: 10,
                },
                FileObject {
                    id: "file-chart".into(),
                    filename: "chart.png".into(),
                    purpose: "assistants_output".into(),
                    bytes: 10,
                },
            ]),
    );
    let engine = engine(transport.clone(), Calls::default())
        .with_uploads(transport.clone())
        .with_config(EngineConfig {
            attach_uploaded_files: true,
            ..Default::default()
        });

    engine.run_turn("main", "hi", None).await;

    let posted = transport.posted.lock().unwrap();
    assert_eq!(posted[0].attachments, vec!["file-prefs".to_string()]);
}

struct RecordingSink {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactSink for RecordingSink {
    async fn collect(&self, messages: &[ThreadMessage]) -> Vec<PathBuf> {
        let mut seen = self.seen.lock().unwrap();
        seen.extend(messages.iter().map(|m| m.id.clone()));
        vec![PathBuf::from("artifacts/chart.png")]
    }
}

#[tokio::test]
async fn test_artifacts_collected_on_completion() {
    let transport = Arc::new(ScriptedTransport::new(vec![completed()]).with_messages(vec![answer("ok")]));
    let sink = Arc::new(RecordingSink {
        seen: Mutex::new(Vec::new()),
    });
    let engine = engine(transport, Calls::default()).with_artifacts(sink.clone());

    let report = engine.execute(TurnRequest::new("main", "export")).await;

    assert_eq!(report.artifacts, vec![PathBuf::from("artifacts/chart.png")]);
    assert_eq!(*sink.seen.lock().unwrap(), vec!["msg_answer".to_string()]);
}
