//! Dual embedding capabilities for hybrid retrieval.
//!
//! Dense vectors come from a remote model endpoint, sparse vectors from a
//! local BM25-style term weighting. Both are pure with respect to input
//! text and both fail soft: callers skip the chunk (indexing) or zero out
//! that half of the score (retrieval).

pub mod dense;
pub mod sparse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

pub use dense::RemoteDenseEmbedder;
pub use sparse::Bm25SparseEmbedder;

/// Weighted term set over a hashed vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product over matching indices.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut score = 0.0;
        for (idx, value) in self.indices.iter().zip(self.values.iter()) {
            if let Some(pos) = other.indices.iter().position(|i| i == idx) {
                score += value * other.values[pos];
            }
        }
        score
    }
}

#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Fixed output dimension, used to size collections.
    fn dimension(&self) -> usize;
}

#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<SparseVector, RagError>;
}
