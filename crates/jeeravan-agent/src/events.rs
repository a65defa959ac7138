// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime event payloads and the outbound sink abstraction.
//!
//! Frames are JSON objects of the form `{"event": "<name>", "data": {...}}`.

use async_trait::async_trait;
use jeeravan_core::{AiResponse, JeeravanError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Inbound `ai-message` payload.
///
/// Fields are optional on the wire so that malformed messages can be
/// answered with a validation error instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiMessage {
    #[serde(default)]
    pub chat: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "userName")]
    pub user_name: Option<String>,
}

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "ai-message")]
    AiMessage(AiMessage),
}

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "ai-response")]
    AiResponse(AiResponse),
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerEvent {
    pub fn reply(content: impl Into<String>, chat: Option<String>) -> Self {
        ServerEvent::AiResponse(AiResponse {
            content: content.into(),
            chat,
        })
    }

    pub fn error(err: &JeeravanError) -> Self {
        ServerEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, JeeravanError> {
        serde_json::to_string(self)
            .map_err(|e| JeeravanError::Internal(format!("failed to encode event: {e}")))
    }
}

/// Destination for outbound events of one connection.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Fails with [`JeeravanError::Channel`] once the connection is gone.
    async fn emit(&self, event: ServerEvent) -> Result<(), JeeravanError>;
}

#[async_trait]
impl ResponseSink for mpsc::Sender<ServerEvent> {
    async fn emit(&self, event: ServerEvent) -> Result<(), JeeravanError> {
        self.send(event).await.map_err(|e| JeeravanError::Channel {
            message: "connection closed".into(),
            source: Some(Box::new(e)),
        })
    }
}
