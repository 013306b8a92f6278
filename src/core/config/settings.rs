//! Typed service settings.
//!
//! Every section and field has a default, so an empty `config.yml` yields
//! a runnable (if key-less) configuration.

use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub openai: OpenAiSettings,
    pub agent: AgentSettings,
    pub sql: SqlSettings,
    pub vector: VectorSettings,
    pub search: SearchSettings,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub rate_limit: RateLimitSettings,
    pub cors: CorsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            timeout_secs: 120,
        }
    }
}

impl OpenAiSettings {
    /// The API key, unless it is missing, blank or the template placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_message: Option<String>,
    pub max_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model_name: "gpt-4o".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            system_message: None,
            max_iterations: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlSettings {
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_k: usize,
    pub sample_rows: usize,
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            model_name: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: 1000,
            top_k: 5,
            sample_rows: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub urls_file: String,
    pub additional_urls: Vec<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub cache_enabled: bool,
    pub cache_ttl_days: i64,
    pub tool_name: String,
    pub tool_description: String,
    pub top_k: usize,
    pub fetch_timeout_secs: u64,
    pub embedding_batch_size: usize,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            urls_file: "urls.txt".to_string(),
            additional_urls: Vec::new(),
            chunk_size: 1000,
            chunk_overlap: 200,
            cache_enabled: true,
            cache_ttl_days: 7,
            tool_name: "langsmith_search".to_string(),
            tool_description: "Search for information about LangSmith. For any questions related to LangSmith, you must use this tool.".to_string(),
            top_k: 4,
            fetch_timeout_secs: 30,
            embedding_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub wikipedia_top_k: usize,
    pub arxiv_top_k: usize,
    pub doc_content_chars_max: usize,
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            wikipedia_top_k: 1,
            arxiv_top_k: 1,
            doc_content_chars_max: 1000,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub crm_path: String,
    pub chinook_path: String,
    pub crm_sample_records: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            crm_path: "db/crm.db".to_string(),
            chinook_path: "db/chinook.db".to_string(),
            crm_sample_records: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            per_minute: 60,
            per_hour: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    pub enabled: bool,
    pub allow_origins: Vec<String>,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    pub file_enabled: bool,
    pub file_path: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: LogFormat::Text,
            file_enabled: false,
            file_path: "logs/api.log".to_string(),
        }
    }
}

impl LoggingSettings {
    /// Maps the configured level name onto a `tracing` directive.
    pub fn tracing_level(&self) -> Option<&'static str> {
        match self.level.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Some("trace"),
            "DEBUG" => Some("debug"),
            "INFO" => Some("info"),
            "WARNING" | "WARN" => Some("warn"),
            "ERROR" | "CRITICAL" => Some("error"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let settings: Settings = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(settings.server.port, 9080);
        assert_eq!(settings.agent.model_name, "gpt-4o");
        assert_eq!(settings.sql.model_name, "gpt-3.5-turbo");
        assert_eq!(settings.vector.chunk_size, 1000);
        assert_eq!(settings.vector.chunk_overlap, 200);
        assert_eq!(settings.vector.tool_name, "langsmith_search");
        assert_eq!(settings.database.crm_sample_records, 25);
        assert!(!settings.rate_limit.enabled);
        assert!(settings.cors.enabled);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "agent": { "model_name": "gpt-4o-mini" },
            "logging": { "format": "json" }
        }))
        .unwrap();
        assert_eq!(settings.agent.model_name, "gpt-4o-mini");
        assert_eq!(settings.agent.max_tokens, 2000);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "INFO");
    }

    #[test]
    fn placeholder_key_is_not_usable() {
        let mut openai = OpenAiSettings::default();
        assert!(openai.usable_api_key().is_none());
        openai.api_key = Some(PLACEHOLDER_API_KEY.to_string());
        assert!(openai.usable_api_key().is_none());
        openai.api_key = Some(" sk-test ".to_string());
        assert_eq!(openai.usable_api_key(), Some("sk-test"));
    }

    #[test]
    fn log_levels_map_to_tracing() {
        let mut logging = LoggingSettings::default();
        assert_eq!(logging.tracing_level(), Some("info"));
        logging.level = "warning".to_string();
        assert_eq!(logging.tracing_level(), Some("warn"));
        logging.level = "CRITICAL".to_string();
        assert_eq!(logging.tracing_level(), Some("error"));
        logging.level = "LOUD".to_string();
        assert_eq!(logging.tracing_level(), None);
    }
}
