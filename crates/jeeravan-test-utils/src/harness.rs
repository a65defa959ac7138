// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test environment with a temporary SQLite store and mock backends.

use std::sync::Arc;

use jeeravan_config::model::{JeeravanConfig, MemoryBackend};
use jeeravan_core::{JeeravanError, StorageAdapter};
use jeeravan_storage::SqliteStorage;

use crate::mock_provider::{MockEmbedder, MockProvider};

pub struct TestHarnessBuilder {
    replies: Vec<String>,
    config: JeeravanConfig,
    dimensions: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = JeeravanConfig::default();
        config.memory.backend = MemoryBackend::Disabled;
        config.auth.jwt_secret = Some("test-secret-with-enough-entropy".into());
        Self {
            replies: Vec::new(),
            config,
            dimensions: 16,
        }
    }

    /// Queue replies for the mock provider.
    pub fn with_mock_responses(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    /// Start from `config`; its storage path is replaced by a temp file.
    pub fn with_config(mut self, config: JeeravanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub async fn build(self) -> Result<TestHarness, JeeravanError> {
        let temp_dir = tempfile::TempDir::new().map_err(JeeravanError::persistence)?;
        let db_path = temp_dir.path().join("test.db").to_string_lossy().into_owned();

        let mut config = self.config;
        config.storage.database_path = db_path.clone();
        config.gemini.embedding_dimensions = self.dimensions;

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;

        Ok(TestHarness {
            storage: Arc::new(storage),
            embedder: Arc::new(MockEmbedder::new(self.dimensions)),
            provider: Arc::new(MockProvider::with_replies(self.replies)),
            config,
            db_path,
            _temp_dir: temp_dir,
        })
    }
}

/// Storage on a temp database plus mock backends. The database is removed
/// when the harness is dropped.
pub struct TestHarness {
    pub storage: Arc<dyn StorageAdapter>,
    pub embedder: Arc<MockEmbedder>,
    pub provider: Arc<MockProvider>,
    /// Defaults with memory disabled, a test JWT secret and the temp
    /// database path.
    pub config: JeeravanConfig,
    pub db_path: String,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }
}
