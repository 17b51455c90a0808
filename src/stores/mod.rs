//! Vector store contract and record shapes.
//!
//! The pipeline writes batches of [`VectorRecord`]s and issues top-k
//! similarity queries; everything else about the index (storage layout,
//! distance metric, thresholds) is the store's business. Implementations:
//!
//! - [`pinecone::PineconeStore`] — managed REST index.

pub mod pinecone;

pub use pinecone::PineconeStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Chunk, ScoredChunk, ServiceError};

/// A record ready for upsert: the chunk's id, vector, and payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
    pub metadata: serde_json::Value,
}

impl VectorRecord {
    /// Pairs a chunk with its embedding. The chunk's position is folded into
    /// the metadata so retrieval can reconstruct the chunk intact.
    pub fn from_chunk(chunk: &Chunk, values: Vec<f32>) -> Self {
        let mut metadata = chunk.metadata.clone();
        if let serde_json::Value::Object(map) = &mut metadata {
            map.insert("chunk_index".into(), chunk.chunk_index.into());
        }
        Self {
            id: chunk.id.clone(),
            values,
            text: chunk.text.clone(),
            metadata,
        }
    }
}

/// One similarity match as returned by a store, most similar first.
#[derive(Clone, Debug)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: serde_json::Value,
}

impl QueryMatch {
    /// Reconstructs the chunk this match refers to.
    pub fn into_scored_chunk(self) -> ScoredChunk {
        let chunk_index = self
            .metadata
            .get("chunk_index")
            .and_then(|value| value.as_u64())
            .unwrap_or(0) as usize;
        ScoredChunk {
            score: self.score,
            chunk: Chunk {
                id: self.id,
                text: self.text,
                chunk_index,
                metadata: self.metadata,
            },
        }
    }
}

/// Index-level statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexStats {
    pub vector_count: usize,
}

/// Write-and-query contract against a vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upserts one batch of records, optionally into a namespace.
    async fn upsert(
        &self,
        records: &[VectorRecord],
        namespace: Option<&str>,
    ) -> Result<(), ServiceError>;

    /// Returns up to `top_k` matches by descending similarity. An empty
    /// index yields an empty result.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, ServiceError>;

    /// Current index statistics.
    async fn stats(&self) -> Result<IndexStats, ServiceError>;
}
