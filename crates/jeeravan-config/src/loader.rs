// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./jeeravan.toml` > `~/.config/jeeravan/jeeravan.toml` >
//! `/etc/jeeravan/jeeravan.toml` with environment variable overrides via the
//! `JEERAVAN_` prefix and the bare deployment variables (`GEMINI_API_KEY`, ...).

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::JeeravanConfig;

/// Bare environment variables honored for compatibility with existing deployments,
/// paired with the config key each one sets.
const CONVENTIONAL_ENV: &[(&str, &str)] = &[
    ("gemini_api_key", "gemini.api_key"),
    ("pinecone_api_key", "memory.pinecone_api_key"),
    ("pinecone_index_host", "memory.pinecone_index_host"),
    ("pinecone_index", "memory.index_name"),
    ("jwt_secret", "auth.jwt_secret"),
    ("port", "server.port"),
];

/// Comma-separated origin list appended to `server.allowed_origins`.
const CLIENT_ORIGIN_ENV: &str = "CLIENT_ORIGIN";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/jeeravan/jeeravan.toml` (system-wide)
/// 3. `~/.config/jeeravan/jeeravan.toml` (user XDG config)
/// 4. `./jeeravan.toml` (local directory)
/// 5. `JEERAVAN_*` environment variables
/// 6. Bare deployment variables (`GEMINI_API_KEY`, `JWT_SECRET`, `PORT`, ...)
pub fn load_config() -> Result<JeeravanConfig, figment::Error> {
    let config: JeeravanConfig = build_figment().extract()?;
    Ok(apply_client_origin(config))
}

/// Load configuration from a TOML string only (no XDG lookup, no environment).
///
/// Used by `--config` and in tests.
pub fn load_config_from_str(toml_content: &str) -> Result<JeeravanConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(JeeravanConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<JeeravanConfig, figment::Error> {
    let config: JeeravanConfig = Figment::new()
        .merge(Serialized::defaults(JeeravanConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(conventional_env_provider())
        .extract()?;
    Ok(apply_client_origin(config))
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(JeeravanConfig::default()))
        .merge(Toml::file("/etc/jeeravan/jeeravan.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("jeeravan/jeeravan.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("jeeravan.toml"))
        .merge(env_provider())
        .merge(conventional_env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `JEERAVAN_GEMINI_CHAT_MODEL` must map to `gemini.chat_model`,
/// not `gemini.chat.model`.
fn env_provider() -> Env {
    Env::prefixed("JEERAVAN_").map(|key| {
        let key_str = key.as_str();
        let mapped = [
            "assistant",
            "server",
            "auth",
            "gemini",
            "memory",
            "pipeline",
            "storage",
        ]
        .iter()
        .find_map(|section| {
            key_str
                .strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}

/// Provider for the bare variables listed in [`CONVENTIONAL_ENV`].
fn conventional_env_provider() -> Env {
    Env::raw().filter_map(|key| {
        let lowered = key.as_str().to_ascii_lowercase();
        CONVENTIONAL_ENV
            .iter()
            .find(|(var, _)| *var == lowered)
            .map(|(_, target)| (*target).into())
    })
}

fn apply_client_origin(mut config: JeeravanConfig) -> JeeravanConfig {
    if let Ok(raw) = std::env::var(CLIENT_ORIGIN_ENV) {
        for origin in raw.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let origin = origin.trim_end_matches('/').to_string();
            if !config.server.allowed_origins.contains(&origin) {
                config.server.allowed_origins.push(origin);
            }
        }
    }
    config
}
