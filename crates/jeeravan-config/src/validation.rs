// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as hosts, origins, and pipeline bounds. All failures are collected.

use crate::diagnostic::ConfigError;
use crate::model::{JeeravanConfig, MemoryBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &JeeravanConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    for origin in &config.server.allowed_origins {
        if !is_valid_origin(origin) {
            errors.push(ConfigError::validation(format!(
                "server.allowed_origins entry `{origin}` must be scheme://host[:port] without a path"
            )));
        }
    }

    if config.auth.cookie_name.trim().is_empty() {
        errors.push(ConfigError::validation("auth.cookie_name must not be empty"));
    }

    if config.auth.jwt_secret.as_deref().is_some_and(|s| s.trim().is_empty()) {
        errors.push(ConfigError::validation(
            "auth.jwt_secret must not be empty when set",
        ));
    }

    if config.gemini.embedding_dimensions == 0 {
        errors.push(ConfigError::validation(
            "gemini.embedding_dimensions must be at least 1",
        ));
    }

    if let Some(t) = config.gemini.temperature
        && !(0.0..=2.0).contains(&t)
    {
        errors.push(ConfigError::validation(format!(
            "gemini.temperature must be between 0.0 and 2.0, got {t}"
        )));
    }

    if config.memory.backend == MemoryBackend::Pinecone
        && let Some(host) = &config.memory.pinecone_index_host
        && !(host.starts_with("https://") || host.starts_with("http://"))
    {
        errors.push(ConfigError::validation(format!(
            "memory.pinecone_index_host `{host}` must include the http(s) scheme"
        )));
    }

    if config.pipeline.recent_messages == 0 {
        errors.push(ConfigError::validation(
            "pipeline.recent_messages must be at least 1",
        ));
    }

    if config.pipeline.memory_top_k == 0 {
        errors.push(ConfigError::validation(
            "pipeline.memory_top_k must be at least 1",
        ));
    }

    if config
        .pipeline
        .fallback_replies
        .iter()
        .all(|r| r.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "pipeline.fallback_replies must contain at least one non-empty reply",
        ));
    }

    if config.pipeline.failure_reply.trim().is_empty() {
        errors.push(ConfigError::validation(
            "pipeline.failure_reply must not be empty",
        ));
    }

    if config.pipeline.no_chat_reply.trim().is_empty() {
        errors.push(ConfigError::validation(
            "pipeline.no_chat_reply must not be empty",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that the credentials the `serve` command needs are present.
///
/// Kept apart from [`validate_config`] so `doctor` and `identity` can run
/// with a partial configuration.
pub fn validate_serve_requirements(config: &JeeravanConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    if config.auth.jwt_secret.is_none() {
        errors.push(ConfigError::validation(
            "auth.jwt_secret is required (set JWT_SECRET or JEERAVAN_AUTH_JWT_SECRET)",
        ));
    }
    if config.gemini.api_key.is_none() {
        errors.push(ConfigError::validation(
            "gemini.api_key is required (set GEMINI_API_KEY or JEERAVAN_GEMINI_API_KEY)",
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_origin(origin: &str) -> bool {
    let Some((scheme, rest)) = origin.split_once("://") else {
        return false;
    };
    matches!(scheme, "http" | "https")
        && !rest.is_empty()
        && !rest.contains('/')
        && !rest.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(errors: Vec<ConfigError>) -> Vec<String> {
        errors.into_iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&JeeravanConfig::default()).is_ok());
    }

    #[test]
    fn zero_recent_messages_fails() {
        let mut config = JeeravanConfig::default();
        config.pipeline.recent_messages = 0;
        let errors = messages(validate_config(&config).unwrap_err());
        assert!(errors.iter().any(|m| m.contains("recent_messages")));
    }

    #[test]
    fn errors_are_collected_not_fail_fast() {
        let mut config = JeeravanConfig::default();
        config.pipeline.memory_top_k = 0;
        config.pipeline.fallback_replies = vec!["  ".into()];
        config.storage.database_path = String::new();
        assert_eq!(validate_config(&config).unwrap_err().len(), 3);
    }

    #[test]
    fn blank_no_chat_reply_fails() {
        let mut config = JeeravanConfig::default();
        config.pipeline.no_chat_reply = " ".into();
        let errors = messages(validate_config(&config).unwrap_err());
        assert!(errors.iter().any(|m| m.contains("no_chat_reply")));
    }

    #[test]
    fn origins_must_not_carry_paths() {
        assert!(is_valid_origin("https://chat.example.com"));
        assert!(is_valid_origin("http://localhost:5173"));
        assert!(!is_valid_origin("https://chat.example.com/app"));
        assert!(!is_valid_origin("chat.example.com"));
        assert!(!is_valid_origin("ftp://x"));
    }

    #[test]
    fn invalid_host_fails() {
        let mut config = JeeravanConfig::default();
        config.server.host = "not a host!".into();
        let errors = messages(validate_config(&config).unwrap_err());
        assert!(errors[0].contains("server.host"));
    }

    #[test]
    fn serve_requires_secrets() {
        let mut config = JeeravanConfig::default();
        assert_eq!(validate_serve_requirements(&config).unwrap_err().len(), 2);
        config.auth.jwt_secret = Some("s3cret".into());
        config.gemini.api_key = Some("key".into());
        assert!(validate_serve_requirements(&config).is_ok());
    }
}
