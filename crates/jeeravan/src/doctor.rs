// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `jeeravan doctor` command implementation.
//!
//! Runs diagnostic checks against the configured environment: credentials,
//! the SQLite database, the semantic memory backend, and the Gemini models
//! visible to the API key.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use jeeravan_config::model::JeeravanConfig;
use jeeravan_core::{HealthStatus, JeeravanError};
use jeeravan_gemini::client::model_path;
use jeeravan_gemini::{GeminiProvider, ModelDiagnostics};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `jeeravan doctor` command.
///
/// With `plain`, disables colored output.
pub async fn run_doctor(config: &JeeravanConfig, plain: bool) -> Result<(), JeeravanError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let mut results = vec![
        check_credentials(config),
        check_database(&config.storage.database_path).await,
        check_memory(config).await,
    ];
    results.extend(check_gemini(config).await);
    results.push(check_memory_baseline());

    println!();
    println!("  jeeravan doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;
    for result in &results {
        match result.status {
            CheckStatus::Pass => {}
            CheckStatus::Warn => warn_count += 1,
            CheckStatus::Fail => fail_count += 1,
        }
        println!("{}", render_line(result, use_color));
    }

    println!("  {}", "-".repeat(50));
    if fail_count > 0 || warn_count > 0 {
        println!("  {fail_count} failed, {warn_count} warning(s).");
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red()),
        };
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Credentials `serve` refuses to start without.
fn check_credentials(config: &JeeravanConfig) -> CheckResult {
    let start = Instant::now();
    match jeeravan_config::validate_serve_requirements(config) {
        Ok(()) => CheckResult::new("Credentials", CheckStatus::Pass, "present", start),
        Err(errors) => {
            let missing: Vec<_> = errors.iter().map(|e| e.to_string()).collect();
            CheckResult::new(
                "Credentials",
                CheckStatus::Fail,
                missing.join("; "),
                start,
            )
        }
    }
}

/// Check database file exists and can be queried.
async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !std::path::Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start);
        }
    };
    let integrity = conn
        .call(|conn| -> Result<String, rusqlite::Error> {
            conn.query_row("PRAGMA quick_check", [], |row| row.get(0))
        })
        .await;
    match integrity {
        Ok(ref status) if status == "ok" => {
            CheckResult::new("Database", CheckStatus::Pass, "connected, integrity ok", start)
        }
        Ok(status) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("integrity check: {status}"),
            start,
        ),
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, format!("query failed: {e}"), start),
    }
}

/// Connects the configured memory backend the same way `serve` does.
async fn check_memory(config: &JeeravanConfig) -> CheckResult {
    let start = Instant::now();
    let memory = jeeravan_memory::connect(
        &config.memory,
        &config.storage.database_path,
        config.gemini.embedding_dimensions,
    )
    .await;
    let backend = memory.backend_name().to_string();
    match memory.health().await {
        HealthStatus::Healthy => {
            CheckResult::new("Semantic memory", CheckStatus::Pass, backend, start)
        }
        HealthStatus::Degraded(reason) => CheckResult::new(
            "Semantic memory",
            CheckStatus::Warn,
            format!("unavailable, running without recall: {reason}"),
            start,
        ),
        HealthStatus::Unhealthy(reason) => CheckResult::new(
            "Semantic memory",
            CheckStatus::Fail,
            format!("{backend}: {reason}"),
            start,
        ),
    }
}

/// Lists models and sends the chat model a test prompt.
async fn check_gemini(config: &JeeravanConfig) -> Vec<CheckResult> {
    let start = Instant::now();
    let provider = match GeminiProvider::new(config).await {
        Ok(provider) => provider,
        Err(e) => {
            return vec![CheckResult::new(
                "Gemini",
                CheckStatus::Warn,
                format!("not configured: {e}"),
                start,
            )];
        }
    };
    let diagnostics = provider.diagnose().await;
    summarize_diagnostics(&diagnostics, start)
}

fn summarize_diagnostics(diagnostics: &ModelDiagnostics, start: Instant) -> Vec<CheckResult> {
    let wanted = model_path(&diagnostics.chat_model);
    let models = match &diagnostics.models {
        Ok(models) if models.iter().any(|m| m.name == wanted) => CheckResult::new(
            "Gemini models",
            CheckStatus::Pass,
            format!("{} visible, chat model listed", models.len()),
            start,
        ),
        Ok(models) => CheckResult::new(
            "Gemini models",
            CheckStatus::Warn,
            format!("{} visible, {wanted} not among them", models.len()),
            start,
        ),
        Err(e) => CheckResult::new("Gemini models", CheckStatus::Fail, e.clone(), start),
    };
    let sample = match &diagnostics.sample {
        Ok(reply) => CheckResult::new(
            "Chat model",
            CheckStatus::Pass,
            format!("{} replied ({} chars)", diagnostics.chat_model, reply.chars().count()),
            start,
        ),
        Err(e) => CheckResult::new("Chat model", CheckStatus::Fail, e.clone(), start),
    };
    vec![models, sample]
}

/// Heap usage as reported by jemalloc.
fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jeeravan_config::model::MemoryBackend;
    use jeeravan_gemini::types::ModelInfo;

    fn model(name: &str) -> ModelInfo {
        ModelInfo {
            name: name.into(),
            display_name: None,
            supported_generation_methods: vec!["generateContent".into()],
        }
    }

    #[test]
    fn credentials_fail_without_secrets() {
        let result = check_credentials(&JeeravanConfig::default());
        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.message.contains("jwt_secret"));
    }

    #[tokio::test]
    async fn missing_database_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let result = check_database(&path.to_string_lossy()).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn initialized_database_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.db").to_string_lossy().into_owned();
        let mut config = JeeravanConfig::default();
        config.storage.database_path = path.clone();
        let storage = jeeravan_storage::SqliteStorage::new(config.storage.clone());
        jeeravan_core::StorageAdapter::initialize(&storage).await.unwrap();

        let result = check_database(&path).await;
        assert_eq!(result.status, CheckStatus::Pass, "{}", result.message);
    }

    #[tokio::test]
    async fn disabled_memory_warns() {
        let mut config = JeeravanConfig::default();
        config.memory.backend = MemoryBackend::Disabled;
        let result = check_memory(&config).await;
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn diagnostics_flag_missing_chat_model() {
        let diagnostics = ModelDiagnostics {
            models: Ok(vec![model("models/other")]),
            sample: Err("404".into()),
            chat_model: "gemini-test".into(),
        };
        let results = summarize_diagnostics(&diagnostics, Instant::now());
        assert_eq!(results[0].status, CheckStatus::Warn);
        assert!(results[0].message.contains("models/gemini-test"));
        assert_eq!(results[1].status, CheckStatus::Fail);

        let diagnostics = ModelDiagnostics {
            models: Ok(vec![model("models/gemini-test")]),
            sample: Ok("Namaste".into()),
            chat_model: "models/gemini-test".into(),
        };
        let results = summarize_diagnostics(&diagnostics, Instant::now());
        assert!(results.iter().all(|r| r.status == CheckStatus::Pass));
    }

    #[test]
    fn plain_rendering_uses_tags() {
        let result = CheckResult {
            name: "Database".into(),
            status: CheckStatus::Warn,
            message: "slow".into(),
            duration: Duration::from_millis(5),
        };
        let line = render_line(&result, false);
        assert!(line.contains("[WARN]"));
        assert!(line.contains("(5ms)"));
    }

    #[test]
    fn memory_baseline_reports() {
        let result = check_memory_baseline();
        assert!(result.status == CheckStatus::Pass || result.status == CheckStatus::Warn);
    }
}
