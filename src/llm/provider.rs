use async_trait::async_trait;

use super::types::{ChatMessage, ChatRequest};
use crate::core::errors::ApiError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name used in logs
    fn name(&self) -> &str;

    /// chat completion; returns the assistant message, tool calls included
    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, ApiError>;

    /// generate embeddings, one vector per input, in input order
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}
