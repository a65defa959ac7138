// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user semantic memory.
//!
//! [`SemanticMemory`] wraps a [`VectorIndex`] and partitions it by owner: the
//! namespace of every record is its owner id, and every query carries an
//! owner filter as well. When no index is configured or the startup check
//! fails, memory runs in a degraded mode where writes are dropped and
//! queries return nothing, so callers never need to special-case it.

pub mod pinecone;
pub mod sqlite;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use jeeravan_config::model::{MemoryBackend, MemoryConfig};
use jeeravan_core::{
    HealthStatus, JeeravanError, MemoryFilter, MemoryRecord, PluginAdapter, ScoredRecord,
    VectorIndex,
};
use tracing::{info, trace, warn};

pub use pinecone::PineconeIndex;
pub use sqlite::SqliteVectorIndex;

enum MemoryState {
    Available(Arc<dyn VectorIndex>),
    Unavailable { reason: String },
}

/// Owner-scoped facade over an optional vector index.
#[derive(Clone)]
pub struct SemanticMemory {
    state: Arc<MemoryState>,
}

impl SemanticMemory {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            state: Arc::new(MemoryState::Available(index)),
        }
    }

    /// Memory that accepts every call and does nothing.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(%reason, "semantic memory unavailable, running without recall");
        Self {
            state: Arc::new(MemoryState::Unavailable { reason }),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(*self.state, MemoryState::Available(_))
    }

    /// Name of the backing index, or `"none"`.
    pub fn backend_name(&self) -> &str {
        match &*self.state {
            MemoryState::Available(index) => index.name(),
            MemoryState::Unavailable { .. } => "none",
        }
    }

    pub async fn health(&self) -> HealthStatus {
        match &*self.state {
            MemoryState::Available(index) => index
                .health_check()
                .await
                .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string())),
            MemoryState::Unavailable { reason } => HealthStatus::Degraded(reason.clone()),
        }
    }

    /// Stores `record` in its owner's namespace. Re-upserting an id replaces it.
    pub async fn upsert(&self, record: MemoryRecord) -> Result<(), JeeravanError> {
        let MemoryState::Available(index) = &*self.state else {
            trace!(id = %record.id, "memory unavailable, dropping upsert");
            return Ok(());
        };
        let namespace = record.metadata.owner_id.clone();
        index.upsert(&namespace, record).await
    }

    /// Nearest neighbours of `vector` among `owner_id`'s memories.
    ///
    /// The owner constraint is always applied, whatever `filter` says.
    pub async fn query(
        &self,
        owner_id: &str,
        vector: &[f32],
        top_k: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<ScoredRecord>, JeeravanError> {
        let MemoryState::Available(index) = &*self.state else {
            trace!("memory unavailable, empty recall");
            return Ok(Vec::new());
        };
        let filter = MemoryFilter {
            owner_id: Some(owner_id.to_string()),
            chat_id: filter.chat_id.clone(),
        };
        let hits = index.query(owner_id, vector, top_k, &filter).await?;
        // Another owner's record must never be returned, even if the index
        // ignores the filter.
        Ok(hits.into_iter().filter(|h| filter.matches(&h.metadata)).collect())
    }

    /// Removes every memory belonging to `owner_id`.
    pub async fn delete_by_owner(&self, owner_id: &str) -> Result<(), JeeravanError> {
        match &*self.state {
            MemoryState::Available(index) => index.delete_namespace(owner_id).await,
            MemoryState::Unavailable { .. } => Ok(()),
        }
    }

    /// Removes the memories of a single chat.
    pub async fn delete_by_owner_and_chat(
        &self,
        owner_id: &str,
        chat_id: &str,
    ) -> Result<(), JeeravanError> {
        match &*self.state {
            MemoryState::Available(index) => {
                index
                    .delete_by_filter(owner_id, &MemoryFilter::owner_and_chat(owner_id, chat_id))
                    .await
            }
            MemoryState::Unavailable { .. } => Ok(()),
        }
    }
}

/// Builds semantic memory from configuration.
///
/// Never fails: a missing credential, an unreachable index, or a dimension
/// mismatch with the embedding model yields [`SemanticMemory::unavailable`].
pub async fn connect(
    config: &MemoryConfig,
    storage_path: &str,
    embedding_dimensions: usize,
) -> SemanticMemory {
    match config.backend {
        MemoryBackend::Disabled => SemanticMemory::unavailable("memory backend disabled"),
        MemoryBackend::Sqlite => {
            let path = config.sqlite_path.as_deref().unwrap_or(storage_path);
            match SqliteVectorIndex::open(path).await {
                Ok(index) => {
                    info!(path, "semantic memory using local SQLite index");
                    SemanticMemory::new(Arc::new(index))
                }
                Err(e) => SemanticMemory::unavailable(format!("sqlite index: {e}")),
            }
        }
        MemoryBackend::Pinecone => connect_pinecone(config, embedding_dimensions).await,
    }
}

async fn connect_pinecone(config: &MemoryConfig, embedding_dimensions: usize) -> SemanticMemory {
    let (Some(key), Some(host)) = (
        config.pinecone_api_key.as_deref().filter(|k| !k.is_empty()),
        config.pinecone_index_host.as_deref().filter(|h| !h.is_empty()),
    ) else {
        return SemanticMemory::unavailable("Pinecone API key or index host not configured");
    };

    let index = match PineconeIndex::new(
        key,
        host,
        &config.index_name,
        Duration::from_secs(config.timeout_secs),
    ) {
        Ok(index) => index,
        Err(e) => return SemanticMemory::unavailable(e.to_string()),
    };

    match index.describe_index_stats().await {
        Ok(stats) => {
            if let Some(dimension) = stats.dimension
                && dimension != embedding_dimensions
            {
                return SemanticMemory::unavailable(format!(
                    "index '{}' has dimension {dimension}, embeddings have {embedding_dimensions}",
                    config.index_name
                ));
            }
            info!(
                index = %config.index_name,
                vectors = stats.total_vector_count.unwrap_or(0),
                "semantic memory connected"
            );
            SemanticMemory::new(Arc::new(index))
        }
        Err(e) => SemanticMemory::unavailable(format!("index check failed: {e}")),
    }
}
