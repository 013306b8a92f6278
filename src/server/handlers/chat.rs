use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::header::{HeaderName, CACHE_CONTROL};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::agent::{AgentEvent, AgentService, StreamEvent};
use crate::core::errors::ApiError;
use crate::core::text::{timestamp, truncate_chars};
use crate::server::models::{ChatMetadata, ChatRequest, ChatResponse, ConversationMessage, ValidatedJson};
use crate::state::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

fn require_agent(state: &AppState) -> Result<Arc<AgentService>, ApiError> {
    state.agent.clone().ok_or_else(|| {
        ApiError::ServiceUnavailable(
            "Agent service not initialized. Check the OpenAI API key configuration.".to_string(),
        )
    })
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let agent = require_agent(&state)?;
    let started = Instant::now();
    tracing::info!("Chat request: {}", truncate_chars(&request.message, 100));

    let run = agent
        .invoke(&request.message, &request.history())
        .await
        .map_err(|err| {
            tracing::error!("Chat request failed: {}", err);
            ApiError::Internal(format!("Error processing chat request: {}", err))
        })?;

    let response = ChatResponse {
        response: run.answer().to_string(),
        conversation_history: run
            .conversation()
            .iter()
            .filter_map(ConversationMessage::from_chat)
            .collect(),
        timestamp: timestamp(),
        metadata: ChatMetadata {
            response_time_ms: started.elapsed().as_millis() as u64,
            tools_available: agent.tools().len(),
            tools_used: run.tools_used,
        },
    };
    tracing::info!(
        "Chat response ready in {}ms ({} tools used)",
        response.metadata.response_time_ms,
        response.metadata.tools_used.len()
    );
    Ok(Json(response))
}

/// Server-sent events, one `data:` frame per agent step. The stream closes
/// after the `end` or `error` frame.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = require_agent(&state)?;
    tracing::info!("Streaming chat request: {}", truncate_chars(&request.message, 100));

    let history = request.history();
    let receiver = agent.stream(request.message, history);
    let sse = Sse::new(event_stream(receiver)).keep_alive(KeepAlive::default());

    Ok(([(CACHE_CONTROL, "no-cache"), (X_ACCEL_BUFFERING, "no")], sse))
}

fn event_stream(
    receiver: mpsc::Receiver<AgentEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|event| (event, receiver))
    })
    .map(|event| {
        let payload = StreamEvent::from(event);
        let frame = match serde_json::to_string(&payload) {
            Ok(data) => Event::default().data(data),
            Err(err) => {
                tracing::error!("Failed to serialize stream event: {}", err);
                Event::default().data(r#"{"type":"error","content":"serialization failure"}"#)
            }
        };
        Ok(frame)
    })
}
