//! Deterministic provider for tests: replays queued assistant messages and
//! embeds text as hashed bag-of-words vectors.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};
use crate::core::errors::ApiError;

pub const EMBEDDING_DIM: usize = 64;

#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ChatMessage, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, message: ChatMessage) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(message));
        self
    }

    pub fn push_failure(&self, error: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let digest = Sha256::digest(word.to_lowercase().as_bytes());
        vector[digest[0] as usize % EMBEDDING_DIM] += 1.0;
    }
    vector
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, ApiError> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(message)) => Ok(message),
            Some(Err(error)) => Err(ApiError::Internal(error)),
            None => Err(ApiError::Internal("no scripted reply left".to_string())),
        }
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|input| embed_text(input)).collect())
    }
}
