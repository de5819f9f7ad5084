//! Vector store abstraction.
//!
//! One collection per user, holding hybrid points (dense + sparse vector
//! plus a text payload). `ensure_collection` is create-or-replace:
//! replacing destroys existing points, so indexing always re-submits the
//! full point set for the user.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;
use crate::embedding::SparseVector;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

/// Collection naming convention shared with the front end.
pub fn collection_for_user(user_id: &str) -> String {
    format!("{}_collection", user_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
    pub file_id: String,
    pub user_id: String,
}

/// A fully embedded chunk ready for upsert.
#[derive(Debug, Clone)]
pub struct PointRecord {
    pub id: String,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub payload: PointPayload,
}

/// One raw similarity hit from a single-sided query.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection, replacing any existing one with the same
    /// name. All previously stored points are destroyed.
    async fn ensure_collection(
        &self,
        collection: &str,
        dense_dim: usize,
        distance: Distance,
    ) -> Result<(), RagError>;

    /// Write points. Partial success is possible; missing points are
    /// simply never found by later queries.
    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<(), RagError>;

    async fn query_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError>;

    async fn query_sparse(
        &self,
        collection: &str,
        sparse: &SparseVector,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RagError>;
}
