// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Jeeravan assistant.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Jeeravan adapter traits and core operations.
#[derive(Debug, Error)]
pub enum JeeravanError {
    /// Missing, malformed, expired, or unresolvable credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Malformed or empty inbound payload.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Embedding or generation backend failure (network, auth, quota, bad response).
    #[error("backend unavailable: {message}")]
    BackendUnavailable {
        message: String,
        source: Option<BoxError>,
    },

    /// Vector index misconfigured or unreachable.
    #[error("memory store unavailable: {0}")]
    StoreUnavailable(String),

    /// Durable store failure (database connection, query failure, serialization).
    #[error("persistence error: {source}")]
    Persistence { source: BoxError },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A referenced record does not exist or is not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Realtime connection transport errors.
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl JeeravanError {
    /// Shorthand for a backend failure without an underlying source.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a persistence failure.
    pub fn persistence(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence {
            source: Box::new(source),
        }
    }

    /// Stable machine-readable code carried in outbound error events and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Validation(_) => "validation",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Persistence { .. } => "persistence",
            Self::Config(_) => "config",
            Self::NotFound { .. } => "not_found",
            Self::Channel { .. } => "channel",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}
