//! Top-k similarity retrieval.

use std::sync::Arc;

use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::stores::{QueryMatch, VectorStore};
use crate::types::{PipelineError, ScoredChunk};

/// Embeds a query and resolves the most similar stored chunks.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    namespace: Option<String>,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Result<Self, PipelineError> {
        if top_k == 0 {
            return Err(PipelineError::Config("top_k must be at least 1".into()));
        }
        Ok(Self {
            store,
            embeddings,
            top_k,
            namespace: None,
        })
    }

    /// Restrict queries to an index namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Returns up to `top_k` chunks by descending similarity.
    ///
    /// An empty store (or nothing above the store's similarity floor) yields
    /// an empty result, not an error. Ties keep the store's native order.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, PipelineError> {
        let vector = self
            .embeddings
            .embed_query(query)
            .await
            .map_err(PipelineError::Retrieval)?;
        let matches = self
            .store
            .query(&vector, self.top_k, self.namespace.as_deref())
            .await
            .map_err(PipelineError::Retrieval)?;

        let mut results: Vec<ScoredChunk> = matches
            .into_iter()
            .map(QueryMatch::into_scored_chunk)
            .collect();
        // Defends against a store returning more than asked for.
        results.truncate(self.top_k);
        debug!(count = results.len(), "retrieved chunks");
        Ok(results)
    }
}
