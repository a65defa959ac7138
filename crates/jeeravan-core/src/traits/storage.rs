// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the conversation store.

use async_trait::async_trait;

use crate::error::JeeravanError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Chat, Identity, Message, Role};

/// Durable record of identities, chats, and messages.
///
/// The conversation store is authoritative for content; the memory index is
/// derived from it.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, pragmas).
    async fn initialize(&self) -> Result<(), JeeravanError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), JeeravanError>;

    // --- Identity operations ---

    async fn create_identity(&self, display_name: &str) -> Result<Identity, JeeravanError>;

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, JeeravanError>;

    async fn delete_identity(&self, id: &str) -> Result<(), JeeravanError>;

    // --- Chat operations ---

    async fn create_chat(&self, owner_id: &str, title: &str) -> Result<Chat, JeeravanError>;

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, JeeravanError>;

    /// Chats of `owner_id`, most recent activity first.
    async fn list_chats(&self, owner_id: &str, limit: usize) -> Result<Vec<Chat>, JeeravanError>;

    /// Sets the chat's last-activity marker to now.
    async fn touch_chat(&self, id: &str) -> Result<(), JeeravanError>;

    async fn delete_chat(&self, id: &str) -> Result<(), JeeravanError>;

    /// Deletes every chat of `owner_id` together with their messages.
    async fn delete_chats_for_owner(&self, owner_id: &str) -> Result<u64, JeeravanError>;

    // --- Message operations ---

    async fn insert_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, JeeravanError>;

    /// The `limit` most recent messages of the chat, oldest first.
    async fn get_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, JeeravanError>;

    /// The first `limit` messages of the chat, oldest first.
    async fn get_messages(&self, chat_id: &str, limit: usize)
    -> Result<Vec<Message>, JeeravanError>;

    async fn delete_messages_for_chat(&self, chat_id: &str) -> Result<u64, JeeravanError>;
}
