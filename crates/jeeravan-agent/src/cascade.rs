// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat and account deletion.
//!
//! The conversation store is authoritative, so memory cleanup failures are
//! logged and never block the delete.

use std::sync::Arc;

use jeeravan_core::{JeeravanError, StorageAdapter};
use jeeravan_memory::SemanticMemory;
use tracing::{info, warn};

#[derive(Clone)]
pub struct DeletionCascade {
    storage: Arc<dyn StorageAdapter>,
    memory: SemanticMemory,
}

/// Counts reported after an account is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDeletion {
    pub chats: u64,
}

impl DeletionCascade {
    pub fn new(storage: Arc<dyn StorageAdapter>, memory: SemanticMemory) -> Self {
        Self { storage, memory }
    }

    /// Deletes a chat owned by `owner_id`: messages, then memories, then
    /// the chat itself. Returns the number of messages removed.
    pub async fn delete_chat(&self, owner_id: &str, chat_id: &str) -> Result<u64, JeeravanError> {
        match self.storage.get_chat(chat_id).await? {
            Some(chat) if chat.owner_id == owner_id => {}
            _ => {
                return Err(JeeravanError::NotFound {
                    entity: "chat",
                    id: chat_id.to_string(),
                });
            }
        }

        let messages = self.storage.delete_messages_for_chat(chat_id).await?;
        if let Err(e) = self.memory.delete_by_owner_and_chat(owner_id, chat_id).await {
            warn!(error = %e, chat_id, "failed to delete chat memories");
        }
        self.storage.delete_chat(chat_id).await?;

        info!(chat_id, messages, "chat deleted");
        Ok(messages)
    }

    /// Deletes every chat, message and memory of `owner_id`, then the
    /// identity. Credentials of a deleted identity no longer resolve.
    pub async fn delete_account(&self, owner_id: &str) -> Result<AccountDeletion, JeeravanError> {
        if self.storage.get_identity(owner_id).await?.is_none() {
            return Err(JeeravanError::NotFound {
                entity: "identity",
                id: owner_id.to_string(),
            });
        }

        let chats = self.storage.delete_chats_for_owner(owner_id).await?;
        if let Err(e) = self.memory.delete_by_owner(owner_id).await {
            warn!(error = %e, owner_id, "failed to delete account memories");
        }
        self.storage.delete_identity(owner_id).await?;

        info!(owner_id, chats, "account deleted");
        Ok(AccountDeletion { chats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jeeravan_core::{MemoryFilter, MemoryMetadata, MemoryRecord, Role};
    use jeeravan_test_utils::{MockVectorIndex, TestHarness};

    async fn seeded() -> (TestHarness, Arc<MockVectorIndex>, DeletionCascade, String, String) {
        let harness = TestHarness::builder().build().await.unwrap();
        let index = Arc::new(MockVectorIndex::new());
        let memory = SemanticMemory::new(index.clone());
        let owner = harness.storage.create_identity("Asha").await.unwrap();
        let chat = harness.storage.create_chat(&owner.id, "t").await.unwrap();
        let message = harness
            .storage
            .insert_message(&chat.id, Role::User, "hi")
            .await
            .unwrap();
        memory
            .upsert(MemoryRecord {
                id: message.id,
                vector: vec![1.0, 0.0],
                metadata: MemoryMetadata {
                    chat_id: chat.id.clone(),
                    owner_id: owner.id.clone(),
                    text: "hi".into(),
                },
            })
            .await
            .unwrap();
        let cascade = DeletionCascade::new(harness.storage.clone(), memory);
        (harness, index, cascade, owner.id, chat.id)
    }

    #[tokio::test]
    async fn delete_chat_removes_messages_and_memories_once() {
        let (harness, index, cascade, owner, chat) = seeded().await;
        assert_eq!(cascade.delete_chat(&owner, &chat).await.unwrap(), 1);

        assert!(harness.storage.get_messages(&chat, 10).await.unwrap().is_empty());
        assert!(harness.storage.get_chat(&chat).await.unwrap().is_none());
        assert_eq!(index.filter_deletes(), 1);
        assert!(
            index
                .query_all(&owner, &MemoryFilter::owner_and_chat(&owner, &chat))
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn memory_failure_does_not_block_chat_delete() {
        let (harness, index, cascade, owner, chat) = seeded().await;
        index.set_failing(true);

        cascade.delete_chat(&owner, &chat).await.unwrap();
        assert!(harness.storage.get_chat(&chat).await.unwrap().is_none());
        assert!(harness.storage.get_messages(&chat, 10).await.unwrap().is_empty());
        assert_eq!(index.filter_deletes(), 1);
    }

    #[tokio::test]
    async fn foreign_chat_is_not_found() {
        let (harness, index, cascade, _owner, chat) = seeded().await;
        let other = harness.storage.create_identity("Ravi").await.unwrap();
        let err = cascade.delete_chat(&other.id, &chat).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(harness.storage.get_chat(&chat).await.unwrap().is_some());
        assert_eq!(index.filter_deletes(), 0);
    }

    #[tokio::test]
    async fn delete_account_cascades_everything() {
        let (harness, index, cascade, owner, chat) = seeded().await;
        harness.storage.create_chat(&owner, "second").await.unwrap();

        let deleted = cascade.delete_account(&owner).await.unwrap();
        assert_eq!(deleted.chats, 2);
        assert!(harness.storage.get_identity(&owner).await.unwrap().is_none());
        assert!(harness.storage.get_chat(&chat).await.unwrap().is_none());
        assert!(harness.storage.list_chats(&owner, 50).await.unwrap().is_empty());
        assert_eq!(index.namespace_deletes(), 1);
        assert_eq!(index.len().await, 0);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let (_harness, _index, cascade, _owner, _chat) = seeded().await;
        assert_eq!(
            cascade.delete_account("nobody").await.unwrap_err().code(),
            "not_found"
        );
    }
}
