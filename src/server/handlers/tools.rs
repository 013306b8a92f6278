use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::core::errors::ApiError;
use crate::state::AppState;
use crate::tools::ToolSummary;

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolSummary>,
    pub total: usize,
}

pub async fn list_tools(State(state): State<Arc<AppState>>) -> Result<Json<ToolsResponse>, ApiError> {
    let agent = state.agent.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Agent service not initialized".to_string())
    })?;
    let tools = agent.tool_summaries();
    Ok(Json(ToolsResponse {
        total: tools.len(),
        tools,
    }))
}
