// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory vector index with call counters and a failure switch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use jeeravan_core::{
    AdapterType, HealthStatus, JeeravanError, MemoryFilter, MemoryRecord, PluginAdapter,
    ScoredRecord, VectorIndex,
};
use jeeravan_memory::types::cosine_similarity;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MockVectorIndex {
    namespaces: Mutex<HashMap<String, HashMap<String, MemoryRecord>>>,
    failing: AtomicBool,
    upserts: AtomicUsize,
    queries: AtomicUsize,
    filter_deletes: AtomicUsize,
    namespace_deletes: AtomicUsize,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every operation fails with `StoreUnavailable` (calls are
    /// still counted).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn filter_deletes(&self) -> usize {
        self.filter_deletes.load(Ordering::SeqCst)
    }

    pub fn namespace_deletes(&self) -> usize {
        self.namespace_deletes.load(Ordering::SeqCst)
    }

    /// Total records across all namespaces.
    pub async fn len(&self) -> usize {
        self.namespaces.lock().await.values().map(HashMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every record in `namespace` matching `filter`, in no particular order.
    pub async fn query_all(&self, namespace: &str, filter: &MemoryFilter) -> Vec<MemoryRecord> {
        self.namespaces
            .lock()
            .await
            .get(namespace)
            .map(|records| {
                records
                    .values()
                    .filter(|r| filter.matches(&r.metadata))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), JeeravanError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(JeeravanError::StoreUnavailable(
                "mock index forced failure".into(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PluginAdapter for MockVectorIndex {
    fn name(&self) -> &str {
        "mock-index"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorIndex
    }

    async fn health_check(&self) -> Result<HealthStatus, JeeravanError> {
        Ok(match self.check() {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), JeeravanError> {
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn upsert(&self, namespace: &str, record: MemoryRecord) -> Result<(), JeeravanError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.namespaces
            .lock()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<ScoredRecord>, JeeravanError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut hits: Vec<ScoredRecord> = self
            .query_all(namespace, filter)
            .await
            .into_iter()
            .filter_map(|r| {
                cosine_similarity(vector, &r.vector).map(|score| ScoredRecord {
                    id: r.id,
                    score,
                    metadata: r.metadata,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &MemoryFilter,
    ) -> Result<(), JeeravanError> {
        self.filter_deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if let Some(records) = self.namespaces.lock().await.get_mut(namespace) {
            records.retain(|_, r| !filter.matches(&r.metadata));
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), JeeravanError> {
        self.namespace_deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.namespaces.lock().await.remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jeeravan_core::MemoryMetadata;

    fn record(id: &str, chat: &str, vector: Vec<f32>) -> MemoryRecord {
        MemoryRecord {
            id: id.into(),
            vector,
            metadata: MemoryMetadata {
                chat_id: chat.into(),
                owner_id: "u1".into(),
                text: id.into(),
            },
        }
    }

    #[tokio::test]
    async fn query_ranks_and_truncates() {
        let index = MockVectorIndex::new();
        index.upsert("u1", record("a", "c1", vec![1.0, 0.0])).await.unwrap();
        index.upsert("u1", record("b", "c1", vec![0.6, 0.8])).await.unwrap();
        index.upsert("u1", record("c", "c2", vec![0.0, 1.0])).await.unwrap();

        let hits = index
            .query("u1", &[1.0, 0.0], 2, &MemoryFilter::default())
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(index.queries(), 1);
    }

    #[tokio::test]
    async fn failing_index_counts_calls() {
        let index = MockVectorIndex::new();
        index.set_failing(true);
        assert!(index.delete_namespace("u1").await.is_err());
        assert_eq!(index.namespace_deletes(), 1);
        assert!(index.is_empty().await);
    }
}
