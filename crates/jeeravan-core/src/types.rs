// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the stores, the pipeline, and the transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Short label used in health reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded(_) => "degraded",
            Self::Unhealthy(_) => "unhealthy",
        }
    }
}

/// Identifies the kind of adapter behind a `PluginAdapter`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Embedding,
    Storage,
    VectorIndex,
    Auth,
}

/// An authenticated end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// A named, owned conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    /// Advisory recency marker; not updated transactionally with message writes.
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parses a stored role string, returning `None` for unknown values.
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One immutable turn within a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Metadata attached to every vector in the memory index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetadata {
    pub chat_id: String,
    pub owner_id: String,
    pub text: String,
}

/// A vector-indexed representation of one message. `id` is the source message id.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: MemoryMetadata,
}

/// One similarity query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub metadata: MemoryMetadata,
}

/// Equality filter over memory metadata. `None` fields are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFilter {
    pub owner_id: Option<String>,
    pub chat_id: Option<String>,
}

impl MemoryFilter {
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            chat_id: None,
        }
    }

    pub fn owner_and_chat(owner_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            chat_id: Some(chat_id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owner_id.is_none() && self.chat_id.is_none()
    }

    /// Returns true when `metadata` satisfies every constrained field.
    pub fn matches(&self, metadata: &MemoryMetadata) -> bool {
        self.owner_id
            .as_deref()
            .is_none_or(|owner| owner == metadata.owner_id)
            && self
                .chat_id
                .as_deref()
                .is_none_or(|chat| chat == metadata.chat_id)
    }
}

/// A single `{role, content}` entry handed to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for ConversationTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A generation call: chronological turns plus the optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub turns: Vec<ConversationTurn>,
    pub display_name: Option<String>,
}

/// Text produced by the generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub text: String,
    pub model: String,
}

/// Outbound `ai-response` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiResponse {
    pub content: String,
    pub chat: Option<String>,
}
