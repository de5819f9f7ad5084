//! Qdrant REST client.
//!
//! Uses named vectors: "dense_vectors" (cosine) and "sparse_vectors"
//! (on-disk sparse index). Collection replace is delete-then-create,
//! matching Qdrant's recreate semantics.

use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::RagError;
use crate::embedding::SparseVector;

use super::{Distance, PointRecord, ScoredPoint, VectorStore};

const DENSE_NAME: &str = "dense_vectors";
const SPARSE_NAME: &str = "sparse_vectors";

pub struct QdrantStore {
    base_url: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn store_err(err: impl std::fmt::Display) -> RagError {
        RagError::StoreUnavailable(err.to_string())
    }

    async fn query(
        &self,
        collection: &str,
        using: &str,
        query: Value,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        let url = format!("{}/collections/{}/points/query", self.base_url, collection);
        let body = json!({
            "query": query,
            "using": using,
            "limit": limit,
            "with_payload": true,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::store_err)?;

        if res.status().as_u16() == 404 {
            return Err(RagError::NotFound(format!("collection {}", collection)));
        }
        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::StoreUnavailable(format!(
                "query failed: {}",
                text
            )));
        }

        let payload: Value = res.json().await.map_err(Self::store_err)?;
        let mut hits = Vec::new();
        if let Some(points) = payload["result"]["points"].as_array() {
            for point in points {
                let id = match &point["id"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let score = point["score"].as_f64().unwrap_or(0.0) as f32;
                let payload = serde_json::from_value(point["payload"].clone())
                    .map_err(Self::store_err)?;
                hits.push(ScoredPoint { id, score, payload });
            }
        }
        Ok(hits)
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(
        &self,
        collection: &str,
        dense_dim: usize,
        distance: Distance,
    ) -> Result<(), RagError> {
        let url = format!("{}/collections/{}", self.base_url, collection);

        // delete is idempotent; a 404 just means first creation
        let _ = self.client.delete(&url).send().await.map_err(Self::store_err)?;

        let body = json!({
            "vectors": {
                DENSE_NAME: { "size": dense_dim, "distance": distance.as_str() }
            },
            "sparse_vectors": {
                SPARSE_NAME: { "index": { "on_disk": true } }
            }
        });

        let res = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::store_err)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::StoreUnavailable(format!(
                "create collection failed: {}",
                text
            )));
        }

        tracing::info!("recreated collection {}", collection);
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<(), RagError> {
        if points.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.base_url, collection
        );
        let count = points.len();
        let points: Vec<Value> = points
            .into_iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "vector": {
                        DENSE_NAME: p.dense,
                        SPARSE_NAME: {
                            "indices": p.sparse.indices,
                            "values": p.sparse.values,
                        }
                    },
                    "payload": p.payload,
                })
            })
            .collect();

        let res = self
            .client
            .put(&url)
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(Self::store_err)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::StoreUnavailable(format!(
                "upsert failed: {}",
                text
            )));
        }

        tracing::info!("upserted {} hybrid points into {}", count, collection);
        Ok(())
    }

    async fn query_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        self.query(collection, DENSE_NAME, json!(vector), limit)
            .await
    }

    async fn query_sparse(
        &self,
        collection: &str,
        sparse: &SparseVector,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        let query = json!({
            "indices": sparse.indices,
            "values": sparse.values,
        });
        self.query(collection, SPARSE_NAME, query, limit).await
    }
}
