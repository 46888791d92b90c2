use clap::Parser;
use hestia::adapters::api_handler::ApiState;
use hestia::adapters::health_handler::HealthHandler;
use hestia::adapters::home_client::{register_remote_functions, HomeAutomationClient};
use hestia::adapters::metrics_handler::{MetricsCollector, MetricsHandler};
use hestia::agents::artifacts::ArtifactCollector;
use hestia::agents::assistant::{build_instructions, build_tools, provision};
use hestia::agents::core::TurnEngine;
use hestia::agents::knowledge::{KnowledgeCatalog, KnowledgeSynchronizer, SharedCatalog};
use hestia::agents::registry::FunctionRegistry;
use hestia::agents::selector::{CompletionSelector, KeywordSelector, StoreSelector};
use hestia::agents::session::{SessionManager, DEFAULT_SESSION};
use hestia::agents::transport::{
    AssistantDefinition, AssistantTransport, ChatCompletion, FileTransport,
    OpenAiAssistantsClient,
};
use hestia::cli::Cli;
use hestia::config::{watcher::PathWatcher, SelectorKind, Settings};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;
    let host = settings.server.host.clone();
    let port = settings.server.port;

    info!("Starting Hestia on {}:{}", host, port);

    let client = Arc::new(OpenAiAssistantsClient::new(&settings.assistant_api)?);
    let transport: Arc<dyn AssistantTransport> = client.clone();
    let files: Arc<dyn FileTransport> = client.clone();
    let completions: Arc<dyn ChatCompletion> = client;

    // Knowledge stores
    let catalog: SharedCatalog = Arc::new(RwLock::new(KnowledgeCatalog::new()));
    let synchronizer = Arc::new(KnowledgeSynchronizer::new(
        files.clone(),
        &settings.knowledge.manifest_path,
    ));
    let knowledge_root = settings.knowledge_root();
    if settings.knowledge.enabled {
        match synchronizer.sync_directory(&knowledge_root).await {
            Ok(synced) => {
                info!("Knowledge stores ready: {:?}", synced.names());
                *catalog.write().await = synced;
            }
            Err(e) => warn!("Knowledge sync failed, continuing without it: {}", e),
        }
    }
    let default_store = match &settings.knowledge.default_store {
        Some(store) => Some(catalog.read().await.resolve(store)),
        None => None,
    };

    // Functions
    let mut registry = FunctionRegistry::new();
    match HomeAutomationClient::from_settings(&settings.home)? {
        Some(home) => register_remote_functions(&mut registry, Arc::new(home), &settings.tools),
        None => warn!("home.base_url is not set; no functions registered"),
    }
    let registry = Arc::new(registry);
    info!("Registered functions: {:?}", registry.names());

    // Assistant
    let assistant_id = match (&settings.assistant.id, settings.assistant.provision) {
        (Some(id), false) => id.clone(),
        (id, _) => {
            let definition = AssistantDefinition {
                name: settings.assistant.name.clone(),
                instructions: build_instructions(&settings.assistant.directory, &registry.names())?,
                model: settings.assistant.model.clone(),
                tools: build_tools(&settings.tools),
                knowledge_store_id: default_store.clone(),
            };
            match id {
                Some(id) => {
                    transport.update_assistant(id, &definition).await?;
                    id.clone()
                }
                None => provision(transport.as_ref(), &definition).await?,
            }
        }
    };
    info!("Using assistant {}", assistant_id);

    // Sessions
    let sessions = Arc::new(SessionManager::new(transport.clone()));
    if let Err(e) = sessions.resolve(DEFAULT_SESSION, default_store.as_deref()).await {
        warn!("Failed to create the {} session: {}", DEFAULT_SESSION, e);
    }

    // Engine
    let mut engine = TurnEngine::new(transport, sessions, registry, assistant_id)
        .with_config(settings.engine_config())
        .with_catalog(catalog.clone())
        .with_uploads(files.clone());
    if settings.artifacts.enabled {
        engine = engine.with_artifacts(Arc::new(ArtifactCollector::new(
            files.clone(),
            &settings.artifacts.output_dir,
        )));
    }
    let descriptions = settings.knowledge.descriptions.clone();
    let selector: Option<Arc<dyn StoreSelector>> = match settings.knowledge.selector {
        SelectorKind::None => None,
        SelectorKind::Keyword => Some(Arc::new(KeywordSelector::new(descriptions))),
        SelectorKind::Completion => Some(Arc::new(CompletionSelector::new(
            completions,
            settings.knowledge.selector_model.clone(),
            descriptions,
        ))),
    };
    if let Some(selector) = selector {
        engine = engine.with_selector(selector);
    }
    let engine = Arc::new(engine);

    // Re-sync knowledge stores when their files change
    let _watcher = if settings.knowledge.enabled && settings.knowledge.watch {
        let runtime = tokio::runtime::Handle::current();
        let synchronizer = synchronizer.clone();
        let catalog = catalog.clone();
        let root = knowledge_root.clone();
        Some(PathWatcher::new(vec![knowledge_root], move || {
            let synchronizer = synchronizer.clone();
            let catalog = catalog.clone();
            let root = root.clone();
            runtime.spawn(async move {
                match synchronizer.sync_directory(&root).await {
                    Ok(synced) => {
                        *catalog.write().await = synced;
                        info!("Knowledge stores re-synced");
                    }
                    Err(e) => error!("Failed to re-sync knowledge stores: {}", e),
                }
            });
        })?)
    } else {
        None
    };

    // HTTP surface
    let collector = Arc::new(MetricsCollector::new()?);
    let api_state = ApiState {
        engine: engine.clone(),
        metrics: collector.clone(),
        prompt: Arc::new(settings.prompt.clone()),
    };
    let health_handler = Arc::new(HealthHandler::new(engine, Some(catalog)));
    let metrics_handler = Arc::new(MetricsHandler::new(collector));

    let app = hestia::create_app(api_state, health_handler, metrics_handler);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
