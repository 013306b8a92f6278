use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::core::errors::{ApiError, FieldError};
use crate::llm::{ChatMessage, Role};

pub const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
}

impl From<ConversationMessage> for ChatMessage {
    fn from(message: ConversationMessage) -> Self {
        match message.role {
            ConversationRole::User => ChatMessage::user(message.content),
            ConversationRole::Assistant => ChatMessage::assistant(message.content),
            ConversationRole::System => ChatMessage::system(message.content),
        }
    }
}

impl ConversationMessage {
    /// Tool messages have no place in a client-visible history.
    pub fn from_chat(message: &ChatMessage) -> Option<Self> {
        let role = match message.role {
            Role::User => ConversationRole::User,
            Role::Assistant => ConversationRole::Assistant,
            Role::System => ConversationRole::System,
            Role::Tool => return None,
        };
        Some(Self {
            role,
            content: message.text().to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Option<Vec<ConversationMessage>>,
}

impl ChatRequest {
    pub fn history(&self) -> Vec<ChatMessage> {
        self.conversation_history
            .iter()
            .flatten()
            .cloned()
            .map(ChatMessage::from)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMetadata {
    pub response_time_ms: u64,
    pub tools_available: usize,
    pub tools_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_history: Vec<ConversationMessage>,
    pub timestamp: String,
    pub metadata: ChatMetadata,
}

/// Post-deserialization checks for request bodies.
pub trait Validate {
    fn validate(&mut self) -> Result<(), Vec<FieldError>>;
}

impl Validate for ChatRequest {
    /// Trims the message and bounds its length.
    fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        let trimmed = self.message.trim();
        let chars = trimmed.chars().count();
        if chars == 0 {
            return Err(vec![FieldError::new(
                "message",
                "Message cannot be empty",
                "string_too_short",
            )]);
        }
        if chars > MAX_MESSAGE_CHARS {
            return Err(vec![FieldError::new(
                "message",
                format!("Message must be at most {} characters", MAX_MESSAGE_CHARS),
                "string_too_long",
            )]);
        }
        self.message = trimmed.to_string();
        Ok(())
    }
}

/// `Json<T>` that also runs [`Validate`]; every failure becomes a 422.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut value) = Json::<T>::from_request(req, state).await?;
        value.validate().map_err(ApiError::Validation)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            conversation_history: None,
        }
    }

    #[test]
    fn message_is_trimmed_and_bounded() {
        let mut ok = request("  hello  ");
        ok.validate().unwrap();
        assert_eq!(ok.message, "hello");

        let errors = request("   ").validate().unwrap_err();
        assert_eq!(errors[0].field, "message");
        assert_eq!(errors[0].kind, "string_too_short");

        let mut at_limit = request(&"é".repeat(MAX_MESSAGE_CHARS));
        assert!(at_limit.validate().is_ok());

        let errors = request(&"a".repeat(MAX_MESSAGE_CHARS + 1)).validate().unwrap_err();
        assert_eq!(errors[0].kind, "string_too_long");
    }

    #[test]
    fn history_roles_are_restricted() {
        let parsed: ChatRequest = serde_json::from_value(json!({
            "message": "hi",
            "conversation_history": [
                {"role": "user", "content": "a"},
                {"role": "assistant", "content": "b"}
            ]
        }))
        .unwrap();
        let history = parsed.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);

        let bad = serde_json::from_value::<ChatRequest>(json!({
            "message": "hi",
            "conversation_history": [{"role": "tool", "content": "a"}]
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn tool_messages_are_hidden_from_clients() {
        assert!(ConversationMessage::from_chat(&ChatMessage::tool_result("1", "x")).is_none());
        let user = ConversationMessage::from_chat(&ChatMessage::user("hey")).unwrap();
        assert_eq!(user.role, ConversationRole::User);
    }
}
