use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to initialize CRM database: {0}")]
    Crm(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to initialize agent tools: {0}")]
    Tools(#[source] anyhow::Error),

    #[error("Invalid rate limit configuration: {0}")]
    RateLimit(String),
}
