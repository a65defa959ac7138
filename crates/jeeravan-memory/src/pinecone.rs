// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hosted vector index over the Pinecone data-plane REST API.

use std::time::Duration;

use async_trait::async_trait;
use jeeravan_core::{
    AdapterType, HealthStatus, JeeravanError, MemoryFilter, MemoryMetadata, MemoryRecord,
    PluginAdapter, ScoredRecord, VectorIndex,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

/// [`VectorIndex`] backed by a Pinecone index host.
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    index_name: String,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a MemoryMetadata,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Value>,
}

/// Subset of `describe_index_stats` used for the startup check.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub total_vector_count: Option<u64>,
}

impl PineconeIndex {
    /// `host` is the index's data-plane URL, with or without a scheme.
    pub fn new(
        api_key: &str,
        host: &str,
        index_name: &str,
        timeout: Duration,
    ) -> Result<Self, JeeravanError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| JeeravanError::Config(format!("invalid Pinecone API key: {e}")))?;
        key.set_sensitive(true);
        headers.insert("Api-Key", key);
        headers.insert(
            "X-Pinecone-API-Version",
            HeaderValue::from_static("2024-07"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| JeeravanError::StoreUnavailable(format!("HTTP client: {e}")))?;

        let host = host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };

        Ok(Self {
            client,
            host,
            index_name: index_name.to_string(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub async fn describe_index_stats(&self) -> Result<IndexStats, JeeravanError> {
        let response = self.post("/describe_index_stats", &json!({})).await?;
        response
            .json()
            .await
            .map_err(|e| JeeravanError::StoreUnavailable(format!("bad stats response: {e}")))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, JeeravanError> {
        let response = self
            .client
            .post(format!("{}{path}", self.host))
            .json(body)
            .send()
            .await
            .map_err(|e| JeeravanError::StoreUnavailable(format!("Pinecone {path}: {e}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(JeeravanError::StoreUnavailable(format!(
            "Pinecone {path} returned {status}: {body}"
        )))
    }
}

/// Pinecone metadata filter: every constrained field must match exactly.
fn filter_json(filter: &MemoryFilter) -> Option<Value> {
    if filter.is_empty() {
        return None;
    }
    let mut clauses = serde_json::Map::new();
    if let Some(owner) = &filter.owner_id {
        clauses.insert("ownerId".into(), json!({ "$eq": owner }));
    }
    if let Some(chat) = &filter.chat_id {
        clauses.insert("chatId".into(), json!({ "$eq": chat }));
    }
    Some(Value::Object(clauses))
}

#[async_trait]
impl PluginAdapter for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorIndex
    }

    async fn health_check(&self) -> Result<HealthStatus, JeeravanError> {
        Ok(match self.describe_index_stats().await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), JeeravanError> {
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, namespace: &str, record: MemoryRecord) -> Result<(), JeeravanError> {
        let body = json!({
            "vectors": [UpsertVector {
                id: &record.id,
                values: &record.vector,
                metadata: &record.metadata,
            }],
            "namespace": namespace,
        });
        self.post("/vectors/upsert", &body).await?;
        debug!(id = %record.id, "pinecone upsert");
        Ok(())
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
        let mut body = json!({
            "namespace": namespace,
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });
        if let Some(filter) = filter_json(filter) {
            body["filter"] = filter;
        }

        let response: QueryResponse = self
            .post("/query", &body)
            .await?
            .json()
            .await
            .map_err(|e| JeeravanError::StoreUnavailable(format!("bad query response: {e}")))?;

        let hits = response
            .matches
            .into_iter()
            .filter_map(|m| {
                let metadata = m
                    .metadata
                    .and_then(|v| serde_json::from_value::<MemoryMetadata>(v).ok());
                match metadata {
                    Some(metadata) => Some(ScoredRecord {
                        id: m.id,
                        score: m.score,
                        metadata,
                    }),
                    None => {
                        warn!(id = %m.id, "skipping match without usable metadata");
                        None
                    }
                }
            })
            .collect();
        Ok(hits)
    }

    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &MemoryFilter,
    ) -> Result<(), JeeravanError> {
        let Some(filter) = filter_json(filter) else {
            return self.delete_namespace(namespace).await;
        };
        let body = json!({ "namespace": namespace, "filter": filter });
        ignore_missing_namespace(self.post("/vectors/delete", &body).await)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), JeeravanError> {
        let body = json!({ "namespace": namespace, "deleteAll": true });
        ignore_missing_namespace(self.post("/vectors/delete", &body).await)
    }
}

/// Deleting from a namespace that was never written returns 404.
fn ignore_missing_namespace(
    result: Result<reqwest::Response, JeeravanError>,
) -> Result<(), JeeravanError> {
    match result {
        Ok(_) => Ok(()),
        Err(JeeravanError::StoreUnavailable(msg)) if msg.contains("404") => {
            debug!("pinecone delete on empty namespace");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
