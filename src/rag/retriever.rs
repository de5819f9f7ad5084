//! Hybrid dense + sparse retrieval with weighted-sum fusion.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::errors::RagError;
use crate::embedding::{DenseEmbedder, SparseEmbedder};
use crate::vector::{PointPayload, ScoredPoint, VectorStore};

/// A fused candidate built per query, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievedPoint {
    pub id: String,
    pub dense_score: f32,
    pub sparse_score: f32,
    pub combined_score: f32,
    pub payload: PointPayload,
}

pub struct HybridRetriever {
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEmbedder>,
    store: Arc<dyn VectorStore>,
}

impl HybridRetriever {
    pub fn new(
        dense: Arc<dyn DenseEmbedder>,
        sparse: Arc<dyn SparseEmbedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            dense,
            sparse,
            store,
        }
    }

    /// Top-k fused results for `query` against `collection`.
    ///
    /// Each side is queried for `2 * top_k` candidates so the fused
    /// ranking is not starved of overlapping ids. A failed query
    /// embedding silently zeroes that side's contribution; if both
    /// embeddings fail the result is empty. A collection that does not
    /// exist yet (nothing indexed for this user) counts as no
    /// candidates; other store failures propagate.
    pub async fn search(
        &self,
        query: &str,
        collection: &str,
        top_k: usize,
        dense_weight: f32,
        sparse_weight: f32,
    ) -> Result<Vec<RetrievedPoint>, RagError> {
        let oversample = top_k * 2;

        let dense_hits = match self.dense.embed(query).await {
            Ok(vector) => {
                empty_if_missing(self.store.query_dense(collection, &vector, oversample).await)?
            }
            Err(e) => {
                tracing::warn!("dense query embedding failed: {}", e);
                Vec::new()
            }
        };

        let sparse_hits = match self.sparse.embed(query).await {
            Ok(vector) if !vector.is_empty() => {
                empty_if_missing(self.store.query_sparse(collection, &vector, oversample).await)?
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!("sparse query embedding failed: {}", e);
                Vec::new()
            }
        };

        Ok(fuse(dense_hits, sparse_hits, dense_weight, sparse_weight, top_k))
    }
}

fn empty_if_missing(
    result: Result<Vec<ScoredPoint>, RagError>,
) -> Result<Vec<ScoredPoint>, RagError> {
    match result {
        Err(RagError::NotFound(what)) => {
            tracing::debug!("collection {} not indexed yet, no candidates", what);
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Merge both candidate sets by point id and rank by weighted sum.
///
/// A point seen on only one side scores 0.0 on the other. The sort is
/// stable and candidates enter in dense-result order, so score ties keep
/// that order.
fn fuse(
    dense_hits: Vec<ScoredPoint>,
    sparse_hits: Vec<ScoredPoint>,
    dense_weight: f32,
    sparse_weight: f32,
    top_k: usize,
) -> Vec<RetrievedPoint> {
    let mut merged: Vec<RetrievedPoint> = Vec::with_capacity(dense_hits.len());
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for hit in dense_hits {
        by_id.insert(hit.id.clone(), merged.len());
        merged.push(RetrievedPoint {
            id: hit.id,
            dense_score: hit.score,
            sparse_score: 0.0,
            combined_score: 0.0,
            payload: hit.payload,
        });
    }

    for hit in sparse_hits {
        match by_id.get(&hit.id) {
            Some(&idx) => merged[idx].sparse_score = hit.score,
            None => merged.push(RetrievedPoint {
                id: hit.id,
                dense_score: 0.0,
                sparse_score: hit.score,
                combined_score: 0.0,
                payload: hit.payload,
            }),
        }
    }

    for point in &mut merged {
        point.combined_score =
            point.dense_score * dense_weight + point.sparse_score * sparse_weight;
    }

    merged.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(top_k);
    merged
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::embedding::SparseVector;
    use crate::vector::{Distance, MemoryStore, PointRecord};

    use super::*;

    fn hit(id: &str, score: f32) -> ScoredPoint {
        ScoredPoint {
            id: id.to_string(),
            score,
            payload: PointPayload {
                text: String::new(),
                file_id: "f".to_string(),
                user_id: "u".to_string(),
            },
        }
    }

    #[test]
    fn weighted_sum_matches_hand_computation() {
        let fused = fuse(vec![hit("a", 0.9)], vec![hit("a", 0.4)], 0.7, 0.3, 5);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].combined_score - 0.75).abs() < 1e-6);
        assert!((fused[0].dense_score - 0.9).abs() < 1e-6);
        assert!((fused[0].sparse_score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn one_sided_points_score_zero_on_the_other_side() {
        let fused = fuse(vec![hit("d", 0.8)], vec![hit("s", 0.6)], 1.0, 1.0, 5);
        let dense_only = fused.iter().find(|p| p.id == "d").expect("d");
        let sparse_only = fused.iter().find(|p| p.id == "s").expect("s");
        assert_eq!(dense_only.sparse_score, 0.0);
        assert_eq!(sparse_only.dense_score, 0.0);
    }

    #[test]
    fn ties_keep_dense_result_order() {
        let fused = fuse(
            vec![hit("first", 0.5), hit("second", 0.5), hit("third", 0.5)],
            Vec::new(),
            1.0,
            1.0,
            5,
        );
        let ids: Vec<&str> = fused.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn fusion_is_deterministic() {
        let run = || {
            fuse(
                vec![hit("a", 0.9), hit("b", 0.7), hit("c", 0.7)],
                vec![hit("b", 0.5), hit("x", 0.95)],
                0.7,
                0.3,
                3,
            )
            .iter()
            .map(|p| p.id.clone())
            .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn truncates_to_top_k() {
        let fused = fuse(
            (0..10).map(|i| hit(&format!("p{}", i), 1.0 - i as f32 * 0.05)).collect(),
            Vec::new(),
            1.0,
            0.0,
            3,
        );
        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].id, "p0");
    }

    struct FailingDense;

    #[async_trait]
    impl DenseEmbedder for FailingDense {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Err(RagError::EmbeddingUnavailable("down".into()))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct FailingSparse;

    #[async_trait]
    impl SparseEmbedder for FailingSparse {
        async fn embed(&self, _text: &str) -> Result<SparseVector, RagError> {
            Err(RagError::EmbeddingUnavailable("down".into()))
        }
    }

    struct FixedDense(Vec<f32>);

    #[async_trait]
    impl DenseEmbedder for FixedDense {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Ok(self.0.clone())
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    #[tokio::test]
    async fn both_embeddings_failing_yields_empty_result() {
        let store = Arc::new(MemoryStore::new());
        store
            .ensure_collection("c", 2, Distance::Cosine)
            .await
            .expect("collection");

        let retriever =
            HybridRetriever::new(Arc::new(FailingDense), Arc::new(FailingSparse), store);
        let results = retriever
            .search("query", "c", 5, 0.7, 0.3)
            .await
            .expect("search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn missing_collection_yields_empty_result() {
        let store = Arc::new(MemoryStore::new());

        // real sparse embedder so both sides hit the absent collection
        let retriever = HybridRetriever::new(
            Arc::new(FixedDense(vec![1.0, 0.0])),
            Arc::new(crate::embedding::Bm25SparseEmbedder::new()),
            store,
        );
        let results = retriever
            .search("query", "never_indexed_collection", 5, 0.7, 0.3)
            .await
            .expect("search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn sparse_failure_degrades_to_dense_only() {
        let store = Arc::new(MemoryStore::new());
        store
            .ensure_collection("c", 2, Distance::Cosine)
            .await
            .expect("collection");
        store
            .upsert(
                "c",
                vec![PointRecord {
                    id: "p1".to_string(),
                    dense: vec![1.0, 0.0],
                    sparse: SparseVector::default(),
                    payload: PointPayload {
                        text: "hello".to_string(),
                        file_id: "f".to_string(),
                        user_id: "u".to_string(),
                    },
                }],
            )
            .await
            .expect("upsert");

        let retriever = HybridRetriever::new(
            Arc::new(FixedDense(vec![1.0, 0.0])),
            Arc::new(FailingSparse),
            store,
        );
        let results = retriever
            .search("query", "c", 5, 0.7, 0.3)
            .await
            .expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sparse_score, 0.0);
        assert!(results[0].combined_score > 0.0);
    }
}
