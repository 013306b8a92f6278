use axum::Json;
use serde_json::{json, Value};

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Agentic RAG API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health"
    }))
}
