use std::sync::OnceLock;

use regex::Regex;

use super::paths::AppPaths;
use super::settings::Settings;
use crate::core::errors::ApiError;

const VALID_LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Checks settings at startup.
///
/// Inconsistent values that would break a subsystem are errors; anything
/// the service can run with (missing key, missing URL file, odd port) is
/// returned as a warning for the caller to log.
pub fn validate_settings(settings: &Settings, paths: &AppPaths) -> Result<Vec<String>, ApiError> {
    if settings.vector.chunk_size == 0 {
        return Err(config_error("vector.chunk_size", "must be greater than zero"));
    }
    if settings.vector.chunk_overlap >= settings.vector.chunk_size {
        return Err(config_error(
            "vector.chunk_overlap",
            "must be smaller than vector.chunk_size",
        ));
    }
    if settings.agent.max_iterations == 0 {
        return Err(config_error("agent.max_iterations", "must be at least 1"));
    }
    if settings.rate_limit.enabled
        && (settings.rate_limit.per_minute == 0 || settings.rate_limit.per_hour == 0)
    {
        return Err(config_error(
            "rate_limit",
            "per_minute and per_hour must be positive when enabled",
        ));
    }

    let mut warnings = Vec::new();

    match settings.openai.api_key.as_deref().map(str::trim) {
        None | Some("") => warnings.push("OPENAI_API_KEY is not set".to_string()),
        Some(_) if settings.openai.usable_api_key().is_none() => {
            warnings.push("OPENAI_API_KEY is still set to the placeholder value".to_string())
        }
        Some(_) => {}
    }

    let urls_file = paths.resolve(&settings.vector.urls_file);
    if !urls_file.exists() {
        warnings.push(format!("URLs file not found: {}", urls_file.display()));
    }

    for url in &settings.vector.additional_urls {
        if !is_valid_url(url) {
            warnings.push(format!("Ignoring malformed URL in vector.additional_urls: {}", url));
        }
    }

    if !VALID_LOG_LEVELS.contains(&settings.logging.level.to_ascii_uppercase().as_str()) {
        warnings.push(format!(
            "Invalid log level '{}', expected one of {}",
            settings.logging.level,
            VALID_LOG_LEVELS.join(", ")
        ));
    }

    if settings.server.port < 1024 {
        warnings.push(format!(
            "Port {} is outside the recommended range 1024-65535",
            settings.server.port
        ));
    }

    Ok(warnings)
}

pub fn is_valid_url(candidate: &str) -> bool {
    static URL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = URL_PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^https?://(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z]{2,6}\.?|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?]\S+)$",
        )
        .ok()
    });
    pattern
        .as_ref()
        .map(|regex| regex.is_match(candidate.trim()))
        .unwrap_or(false)
}

fn config_error(field: &str, message: &str) -> ApiError {
    ApiError::BadRequest(format!("Invalid config: {} {}", field, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::PLACEHOLDER_API_KEY;

    fn paths() -> AppPaths {
        AppPaths::with_root(std::env::temp_dir().join("agentic-rag-validation-missing"))
    }

    #[test]
    fn missing_key_and_urls_file_are_warnings() {
        let settings = Settings::default();
        let warnings = validate_settings(&settings, &paths()).unwrap();
        assert!(warnings.iter().any(|w| w.contains("OPENAI_API_KEY is not set")));
        assert!(warnings.iter().any(|w| w.contains("URLs file not found")));
    }

    #[test]
    fn placeholder_key_bad_level_and_low_port_are_warnings() {
        let mut settings = Settings::default();
        settings.openai.api_key = Some(PLACEHOLDER_API_KEY.to_string());
        settings.logging.level = "VERBOSE".to_string();
        settings.server.port = 80;

        let warnings = validate_settings(&settings, &paths()).unwrap();
        assert!(warnings.iter().any(|w| w.contains("placeholder")));
        assert!(warnings.iter().any(|w| w.contains("Invalid log level 'VERBOSE'")));
        assert!(warnings.iter().any(|w| w.contains("Port 80")));
    }

    #[test]
    fn overlap_not_smaller_than_chunk_is_error() {
        let mut settings = Settings::default();
        settings.vector.chunk_overlap = settings.vector.chunk_size;
        assert!(validate_settings(&settings, &paths()).is_err());
    }

    #[test]
    fn url_pattern() {
        assert!(is_valid_url("https://docs.smith.langchain.com/overview"));
        assert!(is_valid_url("http://localhost:8080"));
        assert!(is_valid_url("http://127.0.0.1/path?q=1"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("not a url"));
    }
}
