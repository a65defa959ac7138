// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Jeeravan assistant.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Jeeravan configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JeeravanConfig {
    /// Assistant identity and logging settings.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// HTTP and WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Credential signing and verification settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Gemini API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Semantic memory backend settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Message pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Assistant identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    /// Display name of the assistant.
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline persona instruction. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a file containing the persona instruction.
    /// Takes precedence over `system_prompt` if both are set.
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
        }
    }
}

fn default_assistant_name() -> String {
    "Jeeravan".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// What happens to a realtime connection that presents no valid credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnauthenticatedPolicy {
    /// Refuse the upgrade with 401.
    #[default]
    Reject,
    /// Accept and answer every message with the guest message.
    Guest,
}

/// HTTP and WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed for cross-origin requests and WebSocket handshakes.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Policy for connections without a valid credential.
    #[serde(default)]
    pub unauthenticated: UnauthenticatedPolicy,

    /// Canned reply sent to guest connections.
    #[serde(default = "default_guest_message")]
    pub guest_message: String,

    /// Seconds to wait for in-flight turns during shutdown.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            unauthenticated: UnauthenticatedPolicy::default(),
            guest_message: default_guest_message(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_guest_message() -> String {
    "👋 Namaste! Please login and create a new chat to use JEERAVAN AI.".to_string()
}

fn default_drain_timeout_secs() -> u64 {
    30
}

/// Credential signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HS256 signing secret. Required to serve.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Name of the cookie carrying the credential.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Reject tokens without an `exp` claim.
    #[serde(default = "default_require_expiry")]
    pub require_expiry: bool,

    /// Lifetime of tokens minted by `jeeravan identity create`.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Clock skew tolerance when checking expiry.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            cookie_name: default_cookie_name(),
            require_expiry: default_require_expiry(),
            token_ttl_secs: default_token_ttl_secs(),
            leeway_secs: default_leeway_secs(),
        }
    }
}

fn default_cookie_name() -> String {
    "token".to_string()
}

fn default_require_expiry() -> bool {
    false
}

fn default_token_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_leeway_secs() -> u64 {
    30
}

/// Gemini API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    /// Gemini API key. `None` requires the `GEMINI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model used for every generation call.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Dimensionality of vectors produced by `embedding_model`.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on transient (429/5xx) responses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Sampling temperature. `None` uses the model default.
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            temperature: None,
        }
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_chat_model() -> String {
    "models/gemini-2.5-flash-preview-05-20".to_string()
}

fn default_embedding_model() -> String {
    "models/text-embedding-004".to_string()
}

fn default_embedding_dimensions() -> usize {
    768
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    1
}

/// Which vector index backs semantic memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    /// Pinecone-compatible REST data plane.
    #[default]
    Pinecone,
    /// Local SQLite table with in-process cosine similarity.
    Sqlite,
    /// Memory permanently unavailable.
    Disabled,
}

/// Semantic memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackend,

    /// Pinecone API key. Missing key leaves memory unavailable.
    #[serde(default)]
    pub pinecone_api_key: Option<String>,

    /// Data-plane host of the index, e.g. `https://idx-abc.svc.pinecone.io`.
    #[serde(default)]
    pub pinecone_index_host: Option<String>,

    /// Index name, used for logging and diagnostics.
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Database file for the sqlite backend. Defaults to the storage database.
    #[serde(default)]
    pub sqlite_path: Option<String>,

    /// Per-request timeout for the vector index.
    #[serde(default = "default_memory_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::default(),
            pinecone_api_key: None,
            pinecone_index_host: None,
            index_name: default_index_name(),
            sqlite_path: None,
            timeout_secs: default_memory_timeout_secs(),
        }
    }
}

fn default_index_name() -> String {
    "cohort-chat-gpt".to_string()
}

fn default_memory_timeout_secs() -> u64 {
    10
}

/// Message pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Hard cap on recent messages passed to generation.
    #[serde(default = "default_recent_messages")]
    pub recent_messages: usize,

    /// Number of similar memories retrieved per turn.
    #[serde(default = "default_memory_top_k")]
    pub memory_top_k: usize,

    /// Persona-consistent replies used when generation fails.
    #[serde(default = "default_fallback_replies")]
    pub fallback_replies: Vec<String>,

    /// Reply used when the inbound message cannot be persisted.
    #[serde(default = "default_failure_reply")]
    pub failure_reply: String,

    /// Reply to a message that names no chat, a chat the sender does not
    /// own, or cannot be read or queued.
    #[serde(default = "default_no_chat_reply")]
    pub no_chat_reply: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recent_messages: default_recent_messages(),
            memory_top_k: default_memory_top_k(),
            fallback_replies: default_fallback_replies(),
            failure_reply: default_failure_reply(),
            no_chat_reply: default_no_chat_reply(),
        }
    }
}

fn default_recent_messages() -> usize {
    20
}

fn default_memory_top_k() -> usize {
    3
}

fn default_fallback_replies() -> Vec<String> {
    vec![
        "Arre bhiya, thoda network ka jhol ho gaya! Ek baar phir se try karo na. 🙏".to_string(),
        "Bhiya Ram! Abhi dimaag thoda garam ho gaya hai, ek minute baad phir poochho. 🌶️"
            .to_string(),
        "Sarafa jaisi bheed lagi hai abhi, thodi der mein phir se message karo bhiya!".to_string(),
        "JEERAVAN AI service is currently unavailable. Please try again later.".to_string(),
    ]
}

fn default_failure_reply() -> String {
    "Something went wrong. Please try again later.".to_string()
}

fn default_no_chat_reply() -> String {
    "👋 Namaste! Please create a new chat or open one of yours to talk to JEERAVAN AI.".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("jeeravan").join("jeeravan.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("jeeravan.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
