// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Jeeravan configuration system.

use jeeravan_config::diagnostic::ConfigError;
use jeeravan_config::model::{MemoryBackend, UnauthenticatedPolicy};
use jeeravan_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all sections deserializes successfully.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[assistant]
name = "Jeeravan"
log_level = "debug"
system_prompt = "Be brief."

[server]
host = "0.0.0.0"
port = 8080
allowed_origins = ["https://chat.example.com"]
unauthenticated = "guest"
guest_message = "please log in"

[auth]
jwt_secret = "s3cret"
cookie_name = "session"
require_expiry = true

[gemini]
api_key = "g-key"
chat_model = "models/gemini-2.0-flash"
embedding_dimensions = 768
temperature = 0.7

[memory]
backend = "sqlite"
sqlite_path = "/tmp/mem.db"

[pipeline]
recent_messages = 10
memory_top_k = 5
fallback_replies = ["try again"]

[storage]
database_path = "/tmp/test.db"
wal_mode = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.assistant.log_level, "debug");
    assert_eq!(config.assistant.system_prompt.as_deref(), Some("Be brief."));
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.unauthenticated, UnauthenticatedPolicy::Guest);
    assert_eq!(config.server.guest_message, "please log in");
    assert_eq!(config.auth.cookie_name, "session");
    assert!(config.auth.require_expiry);
    assert_eq!(config.gemini.temperature, Some(0.7));
    assert_eq!(config.memory.backend, MemoryBackend::Sqlite);
    assert_eq!(config.pipeline.recent_messages, 10);
    assert_eq!(config.pipeline.fallback_replies, vec!["try again"]);
    assert!(!config.storage.wal_mode);
}

/// Missing sections use defaults without error.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.assistant.name, "Jeeravan");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.unauthenticated, UnauthenticatedPolicy::Reject);
    assert_eq!(config.auth.cookie_name, "token");
    assert!(config.auth.jwt_secret.is_none());
    assert_eq!(config.gemini.chat_model, "models/gemini-2.5-flash-preview-05-20");
    assert_eq!(config.gemini.embedding_model, "models/text-embedding-004");
    assert_eq!(config.memory.backend, MemoryBackend::Pinecone);
    assert_eq!(config.memory.index_name, "cohort-chat-gpt");
    assert_eq!(config.pipeline.recent_messages, 20);
    assert_eq!(config.pipeline.memory_top_k, 3);
    assert!(!config.pipeline.fallback_replies.is_empty());
    assert!(config.storage.wal_mode);
}

/// Unknown key produces an UnknownKey diagnostic with a suggestion.
#[test]
fn typo_in_section_suggests_key() {
    let toml = r#"
[gemini]
chat_modle = "x"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, help, .. }
            if key == "chat_modle"
                && suggestion.as_deref() == Some("chat_model")
                && help.contains("embedding_model"))
    });
    assert!(found, "expected UnknownKey for chat_modle, got: {errors:?}");
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_top_level_section_rejected() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown section should be rejected");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "telegram"))
    );
}

/// Bad enum value names the allowed variants.
#[test]
fn bad_policy_value_lists_variants() {
    let toml = r#"
[server]
unauthenticated = "maybe"
"#;

    let errors = load_and_validate_str(toml).expect_err("bad variant should fail");
    let rendered = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(rendered.contains("maybe"), "got: {rendered}");
}

/// Wrong type produces an InvalidType diagnostic keyed by the dotted path.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[server]
port = "eighty"
"#;

    let errors = load_and_validate_str(toml).expect_err("wrong type should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key == "server.port")),
        "got: {errors:?}"
    );
}

/// Semantic validation runs after successful deserialization.
#[test]
fn validation_runs_after_parse() {
    let toml = r#"
[pipeline]
memory_top_k = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero top_k should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("memory_top_k"))
    ));
}

/// Diagnostics render through miette.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "prot".to_string(),
        suggestion: Some("port".to_string()),
        help: "did you mean `port`? valid keys: host, port".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some());

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("prot"));
    assert!(buf.contains("did you mean `port`"));
}
