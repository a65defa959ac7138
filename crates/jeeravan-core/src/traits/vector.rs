// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector index trait: the black-box similarity store behind semantic memory.

use async_trait::async_trait;

use crate::error::JeeravanError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MemoryFilter, MemoryRecord, ScoredRecord};

/// A namespaced vector index.
///
/// Namespaces isolate one owner's records from another's. Every method is
/// fallible here; the memory capability layered on top makes them total.
#[async_trait]
pub trait VectorIndex: PluginAdapter {
    /// Inserts or replaces the record with the same id in `namespace`.
    async fn upsert(&self, namespace: &str, record: MemoryRecord) -> Result<(), JeeravanError>;

    /// Returns up to `top_k` records ordered by descending similarity.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<ScoredRecord>, JeeravanError>;

    /// Removes every record in `namespace` matching `filter`.
    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &MemoryFilter,
    ) -> Result<(), JeeravanError>;

    /// Removes the whole namespace.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), JeeravanError>;
}
