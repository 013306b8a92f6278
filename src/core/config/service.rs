use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 2] = ["max_tokens", "tokens"];

/// Environment variables layered over the YAML files, as
/// (variable, dotted config path).
const ENV_OVERRIDES: [(&str, &str); 10] = [
    ("OPENAI_API_KEY", "openai.api_key"),
    ("OPENAI_BASE_URL", "openai.base_url"),
    ("AGENT_MODEL_NAME", "agent.model_name"),
    ("SQL_MODEL_NAME", "sql.model_name"),
    ("API_HOST", "server.host"),
    ("API_PORT", "server.port"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
    ("RATE_LIMIT_ENABLED", "rate_limit.enabled"),
    ("VECTOR_ADDITIONAL_URLS", "vector.additional_urls"),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    /// Public config with secrets deep-merged over it.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.paths.config_path)?;
        let secrets_config = load_yaml_file(&self.paths.secrets_path)?;
        Ok(deep_merge(&public_config, &secrets_config))
    }

    /// Loads the merged files, applies environment overrides and
    /// deserializes the result.
    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let mut config = self.load_config()?;
        let overrides: Vec<(&str, String)> = ENV_OVERRIDES
            .iter()
            .filter_map(|(var, path)| env::var(var).ok().map(|value| (*path, value)))
            .collect();
        apply_overrides(&mut config, &overrides);
        settings_from_value(config)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(config: Value) -> Result<Settings, ApiError> {
    serde_json::from_value(config)
        .map_err(|err| ApiError::BadRequest(format!("Invalid configuration: {}", err)))
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = serde_yaml::from_str::<Value>(&contents).map_err(|err| {
        ApiError::BadRequest(format!("Failed to parse {}: {}", path.display(), err))
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ApiError::BadRequest(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn apply_overrides(config: &mut Value, overrides: &[(&str, String)]) {
    for (path, raw) in overrides {
        let Some((section, key)) = path.split_once('.') else {
            continue;
        };
        if !config.is_object() {
            *config = Value::Object(Map::new());
        }
        let Some(root) = config.as_object_mut() else {
            continue;
        };
        let section_value = root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !section_value.is_object() {
            *section_value = Value::Object(Map::new());
        }
        if let Some(section_map) = section_value.as_object_mut() {
            section_map.insert(key.to_string(), coerce_env_value(key, raw));
        }
    }
}

/// Env values are strings; numbers, booleans and comma lists are coerced
/// so they deserialize into the typed fields.
fn coerce_env_value(key: &str, raw: &str) -> Value {
    let trimmed = raw.trim();
    if key.ends_with("urls") || key.ends_with("origins") {
        return Value::Array(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        );
    }
    if key == "port" {
        if let Ok(number) = trimmed.parse::<u64>() {
            return Value::from(number);
        }
    }
    if key == "enabled" {
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => return Value::Bool(true),
            "false" | "0" | "no" => return Value::Bool(false),
            _ => {}
        }
    }
    Value::String(trimmed.to_string())
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST.iter().any(|allowed| *allowed == key_lower) {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
