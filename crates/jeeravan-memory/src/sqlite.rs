// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local vector index stored in the `memory_vectors` table.
//!
//! Vectors are BLOBs; similarity is computed in process over every row of
//! the namespace, which is fine for single-node deployments.

use async_trait::async_trait;
use jeeravan_core::{
    AdapterType, HealthStatus, JeeravanError, MemoryFilter, MemoryMetadata, MemoryRecord,
    PluginAdapter, ScoredRecord, VectorIndex,
};
use jeeravan_storage::Database;
use jeeravan_storage::database::map_tr_err;
use rusqlite::params;
use tracing::debug;

use crate::types::{blob_to_vec, cosine_similarity, vec_to_blob};

/// SQLite-backed [`VectorIndex`].
pub struct SqliteVectorIndex {
    db: Database,
}

impl SqliteVectorIndex {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens (and migrates) the database at `path`.
    pub async fn open(path: &str) -> Result<Self, JeeravanError> {
        Ok(Self::new(Database::open(path).await?))
    }
}

/// Appends `AND column = ?n` clauses for each constrained filter field.
fn filter_clause(filter: &MemoryFilter, first_param: usize) -> (String, Vec<String>) {
    let mut sql = String::new();
    let mut values = Vec::new();
    for (column, value) in [("owner_id", &filter.owner_id), ("chat_id", &filter.chat_id)] {
        if let Some(value) = value {
            sql.push_str(&format!(" AND {column} = ?{}", first_param + values.len()));
            values.push(value.clone());
        }
    }
    (sql, values)
}

#[async_trait]
impl PluginAdapter for SqliteVectorIndex {
    fn name(&self) -> &str {
        "sqlite-vectors"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorIndex
    }

    async fn health_check(&self) -> Result<HealthStatus, JeeravanError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM memory_vectors", [], |r| {
                    r.get::<_, i64>(0)
                })?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), JeeravanError> {
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, namespace: &str, record: MemoryRecord) -> Result<(), JeeravanError> {
        let namespace = namespace.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO memory_vectors
                       (namespace, id, vector, dimensions, chat_id, owner_id, text, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(namespace, id) DO UPDATE SET
                       vector = excluded.vector,
                       dimensions = excluded.dimensions,
                       chat_id = excluded.chat_id,
                       owner_id = excluded.owner_id,
                       text = excluded.text,
                       updated_at = excluded.updated_at",
                    params![
                        namespace,
                        record.id,
                        vec_to_blob(&record.vector),
                        record.vector.len() as i64,
                        record.metadata.chat_id,
                        record.metadata.owner_id,
                        record.metadata.text,
                        updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<ScoredRecord>, JeeravanError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let namespace = namespace.to_string();
        let query = vector.to_vec();
        let (clause, values) = filter_clause(filter, 2);

        let mut scored = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<ScoredRecord>, rusqlite::Error> {
                let sql = format!(
                    "SELECT id, vector, chat_id, owner_id, text FROM memory_vectors
                     WHERE namespace = ?1{clause}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&namespace];
                bound.extend(values.iter().map(|v| v as &dyn rusqlite::ToSql));
                let mut rows = stmt.query(bound.as_slice())?;

                let mut scored = Vec::new();
                while let Some(row) = rows.next()? {
                    let blob: Vec<u8> = row.get(1)?;
                    let Some(score) = cosine_similarity(&query, &blob_to_vec(&blob)) else {
                        continue;
                    };
                    scored.push(ScoredRecord {
                        id: row.get(0)?,
                        score,
                        metadata: MemoryMetadata {
                            chat_id: row.get(2)?,
                            owner_id: row.get(3)?,
                            text: row.get(4)?,
                        },
                    });
                }
                Ok(scored)
            })
            .await
            .map_err(map_tr_err)?;

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        debug!(hits = scored.len(), "sqlite vector query");
        Ok(scored)
    }

    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &MemoryFilter,
    ) -> Result<(), JeeravanError> {
        let namespace = namespace.to_string();
        let (clause, values) = filter_clause(filter, 2);
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let sql = format!("DELETE FROM memory_vectors WHERE namespace = ?1{clause}");
                let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&namespace];
                bound.extend(values.iter().map(|v| v as &dyn rusqlite::ToSql));
                conn.execute(&sql, bound.as_slice())?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), JeeravanError> {
        let namespace = namespace.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "DELETE FROM memory_vectors WHERE namespace = ?1",
                    params![namespace],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, owner: &str, chat: &str, vector: Vec<f32>) -> MemoryRecord {
        MemoryRecord {
            id: id.into(),
            vector,
            metadata: MemoryMetadata {
                chat_id: chat.into(),
                owner_id: owner.into(),
                text: format!("text of {id}"),
            },
        }
    }

    async fn index() -> (SqliteVectorIndex, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let idx = SqliteVectorIndex::open(dir.path().join("v.db").to_str().unwrap())
            .await
            .unwrap();
        (idx, dir)
    }

    #[tokio::test]
    async fn query_orders_by_similarity() {
        let (idx, _dir) = index().await;
        idx.upsert("u1", record("near", "u1", "c1", vec![1.0, 0.1])).await.unwrap();
        idx.upsert("u1", record("far", "u1", "c1", vec![0.0, 1.0])).await.unwrap();
        idx.upsert("u1", record("mid", "u1", "c1", vec![1.0, 1.0])).await.unwrap();

        let hits = idx
            .query("u1", &[1.0, 0.0], 2, &MemoryFilter::owner("u1"))
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].metadata.text, "text of near");
    }

    #[tokio::test]
    async fn upsert_replaces_vector_for_same_id() {
        let (idx, _dir) = index().await;
        idx.upsert("u1", record("m1", "u1", "c1", vec![1.0, 0.0])).await.unwrap();
        idx.upsert("u1", record("m1", "u1", "c1", vec![0.0, 1.0])).await.unwrap();

        let hits = idx
            .query("u1", &[0.0, 1.0], 5, &MemoryFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let (idx, _dir) = index().await;
        idx.upsert("u1", record("a", "u1", "c1", vec![1.0, 0.0])).await.unwrap();
        idx.upsert("u2", record("b", "u2", "c9", vec![1.0, 0.0])).await.unwrap();

        let hits = idx.query("u2", &[1.0, 0.0], 5, &MemoryFilter::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_skipped() {
        let (idx, _dir) = index().await;
        idx.upsert("u1", record("old", "u1", "c1", vec![1.0, 0.0, 0.0])).await.unwrap();
        idx.upsert("u1", record("new", "u1", "c1", vec![1.0, 0.0])).await.unwrap();

        let hits = idx.query("u1", &[1.0, 0.0], 5, &MemoryFilter::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "new");
    }

    #[tokio::test]
    async fn delete_by_filter_and_namespace() {
        let (idx, _dir) = index().await;
        idx.upsert("u1", record("a", "u1", "c1", vec![1.0, 0.0])).await.unwrap();
        idx.upsert("u1", record("b", "u1", "c2", vec![1.0, 0.0])).await.unwrap();

        idx.delete_by_filter("u1", &MemoryFilter::owner_and_chat("u1", "c1"))
            .await
            .unwrap();
        let hits = idx.query("u1", &[1.0, 0.0], 5, &MemoryFilter::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.chat_id, "c2");

        idx.delete_namespace("u1").await.unwrap();
        assert!(idx.query("u1", &[1.0, 0.0], 5, &MemoryFilter::default()).await.unwrap().is_empty());
    }
}
