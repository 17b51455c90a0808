//! Embedding provider seam.
//!
//! Everything that turns text into vectors implements [`EmbeddingProvider`].
//! The pipeline only ever sees the trait object, so production wires in the
//! hosted service client while tests inject the deterministic mock.

pub mod cache;
pub mod mistral;
pub mod mock;

pub use cache::CachedEmbeddings;
pub use mistral::MistralEmbeddings;
pub use mock::MockEmbeddingProvider;

use async_trait::async_trait;

use crate::types::ServiceError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts: one vector per input, order preserved.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    /// Embeds a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceError::Decode("embedding service returned no vector".into()))
    }
}
