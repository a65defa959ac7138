// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use jeeravan_config::model::StorageConfig;
use jeeravan_core::{
    AdapterType, Chat, HealthStatus, Identity, JeeravanError, Message, PluginAdapter, Role,
    StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed conversation store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage. Nothing is opened until `initialize`.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn db(&self) -> Result<&Database, JeeravanError> {
        self.db.get().ok_or_else(|| JeeravanError::Persistence {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, JeeravanError> {
        let db = match self.db() {
            Ok(db) => db,
            Err(e) => return Ok(HealthStatus::Unhealthy(e.to_string())),
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), JeeravanError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), JeeravanError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| JeeravanError::Persistence {
                source: "storage already initialized".into(),
            })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), JeeravanError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn create_identity(&self, display_name: &str) -> Result<Identity, JeeravanError> {
        queries::identities::create_identity(self.db()?, display_name).await
    }

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, JeeravanError> {
        queries::identities::get_identity(self.db()?, id).await
    }

    async fn delete_identity(&self, id: &str) -> Result<(), JeeravanError> {
        queries::identities::delete_identity(self.db()?, id).await
    }

    async fn create_chat(&self, owner_id: &str, title: &str) -> Result<Chat, JeeravanError> {
        queries::chats::create_chat(self.db()?, owner_id, title).await
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, JeeravanError> {
        queries::chats::get_chat(self.db()?, id).await
    }

    async fn list_chats(&self, owner_id: &str, limit: usize) -> Result<Vec<Chat>, JeeravanError> {
        queries::chats::list_chats(self.db()?, owner_id, limit).await
    }

    async fn touch_chat(&self, id: &str) -> Result<(), JeeravanError> {
        queries::chats::touch_chat(self.db()?, id).await
    }

    async fn delete_chat(&self, id: &str) -> Result<(), JeeravanError> {
        queries::chats::delete_chat(self.db()?, id).await
    }

    async fn delete_chats_for_owner(&self, owner_id: &str) -> Result<u64, JeeravanError> {
        queries::chats::delete_chats_for_owner(self.db()?, owner_id).await
    }

    async fn insert_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, JeeravanError> {
        queries::messages::insert_message(self.db()?, chat_id, role, content).await
    }

    async fn get_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, JeeravanError> {
        queries::messages::get_recent_messages(self.db()?, chat_id, limit).await
    }

    async fn get_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>, JeeravanError> {
        queries::messages::get_messages(self.db()?, chat_id, limit).await
    }

    async fn delete_messages_for_chat(&self, chat_id: &str) -> Result<u64, JeeravanError> {
        queries::messages::delete_messages_for_chat(self.db()?, chat_id).await
    }
}
