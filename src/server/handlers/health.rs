use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::text::timestamp;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ComponentHealth {
    fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub components: BTreeMap<&'static str, ComponentHealth>,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

/// Overall status: a missing agent degrades the service, an unreachable CRM
/// database makes it unhealthy. The vector store and music database are
/// optional and only show up as degraded components.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut components = BTreeMap::new();
    let mut overall = HealthStatus::Healthy;

    let agent = match &state.agent {
        Some(agent) => {
            let info = agent.info();
            ComponentHealth::new(HealthStatus::Healthy, "Agent service operational").with_details(json!({
                "model": info.model,
                "tools_count": info.tools_count,
            }))
        }
        None => {
            overall = HealthStatus::Degraded;
            ComponentHealth::new(HealthStatus::Unhealthy, "Agent service not initialized")
        }
    };
    components.insert("agent", agent);

    let vector_info = state.vector.info().await;
    let vector = if vector_info.initialized {
        ComponentHealth::new(HealthStatus::Healthy, "Vector store operational").with_details(json!({
            "tool_name": vector_info.tool_name,
            "cache_enabled": vector_info.cache_enabled,
            "chunks": vector_info.chunks,
        }))
    } else {
        ComponentHealth::new(HealthStatus::Degraded, "Vector store not initialized (optional)")
    };
    components.insert("vector_store", vector);

    let database = match state.customers.get_customer_count().await {
        Ok(count) => ComponentHealth::new(HealthStatus::Healthy, "Database accessible").with_details(json!({
            "crm_customers": count,
            "database_path": state.customers.db_path().display().to_string(),
        })),
        Err(err) => {
            overall = HealthStatus::Unhealthy;
            ComponentHealth::new(HealthStatus::Unhealthy, format!("Database error: {}", err))
        }
    };
    components.insert("database", database);

    let music = match &state.music_db {
        Some(db) => match db.table_names().await {
            Ok(tables) => ComponentHealth::new(HealthStatus::Healthy, "Music database accessible")
                .with_details(json!({
                    "database_path": db.db_path().display().to_string(),
                    "tables": tables.len(),
                })),
            Err(err) => ComponentHealth::new(HealthStatus::Degraded, format!("Music database error: {}", err)),
        },
        None => ComponentHealth::new(HealthStatus::Degraded, "Music database not available (optional)"),
    };
    components.insert("music_database", music);

    Json(HealthResponse {
        status: overall,
        components,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: timestamp(),
    })
}
