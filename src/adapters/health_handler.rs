use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::core::TurnEngine;
use crate::agents::knowledge::SharedCatalog;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub functions: usize,
    pub sessions: usize,
    pub knowledge_stores: usize,
}

pub struct HealthHandler {
    engine: Arc<TurnEngine>,
    catalog: Option<SharedCatalog>,
    start_time: std::time::Instant,
}

impl HealthHandler {
    pub fn new(engine: Arc<TurnEngine>, catalog: Option<SharedCatalog>) -> Self {
        Self {
            engine,
            catalog,
            start_time: std::time::Instant::now(),
        }
    }

    async fn checks(&self) -> HealthChecks {
        let knowledge_stores = match &self.catalog {
            Some(catalog) => catalog.read().await.names().len(),
            None => 0,
        };
        HealthChecks {
            functions: self.engine.registry().len(),
            sessions: self.engine.sessions().len().await,
            knowledge_stores,
        }
    }

    /// Basic health check - returns 200 if the server is running
    pub async fn health(&self) -> impl IntoResponse {
        let status = HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            checks: self.checks().await,
        };

        (StatusCode::OK, Json(status))
    }

    /// Readiness check - ready once at least one function is registered
    pub async fn ready(&self) -> impl IntoResponse {
        if !self.engine.registry().is_empty() {
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "ready",
                    "message": "Bridge is ready to accept turns"
                })),
            )
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not_ready",
                    "message": "No functions registered"
                })),
            )
        }
    }

    /// Liveness check - returns 200 if the server is responsive
    pub async fn live(&self) -> impl IntoResponse {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "alive",
                "message": "Server is alive"
            })),
        )
    }
}
