//! # Hestia - home-automation assistant bridge
//!
//! Hestia connects a hosted, stateful conversational assistant (OpenAI
//! Assistants v2) to the functions of a home-automation hub. A user message
//! goes in; the assistant may call registered functions any number of times;
//! one textual answer comes out.
//!
//! ## Features
//!
//! - **Turn engine**: explicit run state machine with an iteration bound
//! - **Function registry**: the only functions the assistant can reach
//! - **Pattern-safe arguments**: regex arguments survive the transport's escaping
//! - **Sessions**: named conversations mapped to persistent threads
//! - **Knowledge stores**: directories synced to vector stores, re-synced on change
//! - **Artifacts**: generated charts and exports downloaded locally
//! - **Metrics**: Prometheus turn and tool-call metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hestia::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let settings = Settings::new()?;
//!
//!     // Server will start on configured host:port
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Agents**: turn engine, registry, codec, sessions and the transport ports
//! - **Adapters**: HTTP handlers, metrics and the hub client
//! - **Config**: configuration loading, validation and file watching

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;

use crate::adapters::api_handler::{self, ApiState};
use crate::adapters::health_handler::HealthHandler;
use crate::adapters::metrics_handler::MetricsHandler;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Creates the Axum application router with all endpoints configured.
///
/// # Arguments
///
/// * `api_state` - Turn engine, metrics and prompt settings for the REST API
/// * `health_handler` - Health check handler
/// * `metrics_handler` - Metrics collection handler
pub fn create_app(
    api_state: ApiState,
    health_handler: Arc<HealthHandler>,
    metrics_handler: Arc<MetricsHandler>,
) -> Router {
    let health_router = Router::new()
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }))
        .route("/metrics", get({
            let handler = metrics_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.metrics().await }
            }
        }));

    let api_router = Router::new()
        .route("/turns", post(api_handler::create_turn))
        .route("/sessions", get(api_handler::list_sessions))
        .route("/functions", get(api_handler::list_functions))
        .with_state(api_state);

    health_router.nest("/api", api_router)
}
