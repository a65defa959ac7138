// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for chats, accounts and health.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use jeeravan_core::{Chat, HealthStatus, Identity, JeeravanError, Message, Role};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::server::AppState;

/// Chats returned by the listing.
pub const MAX_LISTED_CHATS: usize = 50;
/// Messages returned per listed chat.
pub const MAX_LISTED_MESSAGES: usize = 100;

const DEFAULT_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: String,
    pub title: String,
    pub last_activity: DateTime<Utc>,
    pub owner_id: String,
}

impl From<Chat> for ChatView {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            title: chat.title,
            last_activity: chat.last_activity,
            owner_id: chat.owner_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateChatResponse {
    pub chat: ChatView,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: String,
    pub text: String,
    /// `"user"` or `"ai"`.
    pub sender: &'static str,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            text: message.content,
            sender: match message.role {
                Role::User => "user",
                Role::Assistant => "ai",
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatWithMessages {
    pub id: String,
    pub title: String,
    pub last_activity: DateTime<Utc>,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatWithMessages>,
}

#[derive(Debug, Serialize)]
pub struct DeleteChatResponse {
    pub deleted: String,
    pub messages: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub deleted: String,
    pub chats: u64,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<HealthStatus> for ComponentHealth {
    fn from(status: HealthStatus) -> Self {
        let detail = match &status {
            HealthStatus::Healthy => None,
            HealthStatus::Degraded(d) | HealthStatus::Unhealthy(d) => Some(d.clone()),
        };
        Self {
            status: status.label(),
            detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub connections: usize,
    pub storage: ComponentHealth,
    pub memory: ComponentHealth,
    pub memory_backend: String,
    pub generation: ComponentHealth,
}

/// POST /api/chat
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateChatRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateChatRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| JeeravanError::Validation(format!("invalid chat body: {e}")))?
    };
    let title = request
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_string());

    let chat = state.storage.create_chat(&identity.id, &title).await?;
    info!(chat_id = %chat.id, owner_id = %identity.id, "chat created");
    Ok((
        StatusCode::CREATED,
        Json(CreateChatResponse { chat: chat.into() }),
    ))
}

/// GET /api/chat
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ChatListResponse>, ApiError> {
    let chats = state
        .storage
        .list_chats(&identity.id, MAX_LISTED_CHATS)
        .await?;

    let chats = try_join_all(chats.into_iter().map(|chat| {
        let storage = state.storage.clone();
        async move {
            let messages = storage.get_messages(&chat.id, MAX_LISTED_MESSAGES).await?;
            Ok::<_, JeeravanError>(ChatWithMessages {
                id: chat.id,
                title: chat.title,
                last_activity: chat.last_activity,
                messages: messages.into_iter().map(MessageView::from).collect(),
            })
        }
    }))
    .await?;

    Ok(Json(ChatListResponse { chats }))
}

/// DELETE /api/chat/{chat_id}
pub async fn delete_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<String>,
) -> Result<Json<DeleteChatResponse>, ApiError> {
    let messages = state.cascade.delete_chat(&identity.id, &chat_id).await?;
    Ok(Json(DeleteChatResponse {
        deleted: chat_id,
        messages,
    }))
}

/// DELETE /api/auth/account
///
/// Removes the caller's identity with everything it owns and clears the
/// credential cookie.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let deletion = state.cascade.delete_account(&identity.id).await?;
    let mut removal = Cookie::build((state.settings.cookie_name.clone(), ""))
        .path("/")
        .build();
    removal.make_removal();
    let jar = jar.add(removal);
    Ok((
        jar,
        Json(DeleteAccountResponse {
            deleted: identity.id,
            chats: deletion.chats,
        }),
    ))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (storage, memory, generation) = tokio::join!(
        state.storage.health_check(),
        state.memory.health(),
        state.provider.health_check(),
    );
    let storage = storage.unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    let generation = generation.unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));

    // Memory is optional; only storage decides overall health.
    let status = if !storage.is_healthy() {
        "unhealthy"
    } else if generation.is_healthy() && memory.is_healthy() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        connections: state.connections.len(),
        storage: storage.into(),
        memory_backend: state.memory.backend_name().to_string(),
        memory: memory.into(),
        generation: generation.into(),
    })
}
