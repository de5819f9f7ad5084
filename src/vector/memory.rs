//! In-process vector store.
//!
//! Brute-force cosine / sparse dot product over points held in memory.
//! Backs the test suite and store-less deployments where no Qdrant
//! endpoint is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::errors::RagError;
use crate::embedding::SparseVector;

use super::{Distance, PointRecord, ScoredPoint, VectorStore};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<PointRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;
        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn top_n(mut hits: Vec<ScoredPoint>, limit: usize) -> Vec<ScoredPoint> {
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        hits
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(
        &self,
        collection: &str,
        _dense_dim: usize,
        _distance: Distance,
    ) -> Result<(), RagError> {
        let mut collections = self.collections.write().await;
        collections.insert(collection.to_string(), Vec::new());
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<(), RagError> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| RagError::NotFound(format!("collection {}", collection)))?;
        for point in points {
            stored.retain(|p| p.id != point.id);
            stored.push(point);
        }
        Ok(())
    }

    async fn query_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        let collections = self.collections.read().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| RagError::NotFound(format!("collection {}", collection)))?;

        let hits = stored
            .iter()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: Self::cosine(vector, &p.dense).max(0.0),
                payload: p.payload.clone(),
            })
            .collect();

        Ok(Self::top_n(hits, limit))
    }

    async fn query_sparse(
        &self,
        collection: &str,
        sparse: &SparseVector,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        let collections = self.collections.read().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| RagError::NotFound(format!("collection {}", collection)))?;

        let hits = stored
            .iter()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: sparse.dot(&p.sparse),
                payload: p.payload.clone(),
            })
            .filter(|h| h.score > 0.0)
            .collect();

        Ok(Self::top_n(hits, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, dense: Vec<f32>, sparse: SparseVector) -> PointRecord {
        PointRecord {
            id: id.to_string(),
            dense,
            sparse,
            payload: crate::vector::PointPayload {
                text: format!("text for {}", id),
                file_id: "f1".to_string(),
                user_id: "u1".to_string(),
            },
        }
    }

    fn sparse(indices: Vec<u32>, values: Vec<f32>) -> SparseVector {
        SparseVector { indices, values }
    }

    #[tokio::test]
    async fn dense_query_ranks_by_cosine() {
        let store = MemoryStore::new();
        store
            .ensure_collection("c", 2, Distance::Cosine)
            .await
            .unwrap();
        store
            .upsert(
                "c",
                vec![
                    point("far", vec![0.0, 1.0], sparse(vec![], vec![])),
                    point("near", vec![1.0, 0.1], sparse(vec![], vec![])),
                ],
            )
            .await
            .unwrap();

        let hits = store.query_dense("c", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits[0].id, "near");
    }

    #[tokio::test]
    async fn sparse_query_skips_non_matching_points() {
        let store = MemoryStore::new();
        store
            .ensure_collection("c", 2, Distance::Cosine)
            .await
            .unwrap();
        store
            .upsert(
                "c",
                vec![
                    point("hit", vec![0.0, 0.0], sparse(vec![7], vec![1.0])),
                    point("miss", vec![0.0, 0.0], sparse(vec![9], vec![1.0])),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .query_sparse("c", &sparse(vec![7], vec![2.0]), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "hit");
        assert!((hits[0].score - 2.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn recreate_destroys_previous_points() {
        let store = MemoryStore::new();
        store
            .ensure_collection("c", 2, Distance::Cosine)
            .await
            .unwrap();
        store
            .upsert(
                "c",
                vec![point("old", vec![1.0, 0.0], sparse(vec![], vec![]))],
            )
            .await
            .unwrap();

        // second upload for the same user: recreate, then the new set only
        store
            .ensure_collection("c", 2, Distance::Cosine)
            .await
            .unwrap();
        store
            .upsert(
                "c",
                vec![point("new", vec![1.0, 0.0], sparse(vec![], vec![]))],
            )
            .await
            .unwrap();

        let hits = store.query_dense("c", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "new");
    }

    #[tokio::test]
    async fn missing_collection_is_not_found() {
        let store = MemoryStore::new();
        let err = store.query_dense("nope", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }
}
