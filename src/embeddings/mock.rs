//! Deterministic embedding provider for tests and offline runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::EmbeddingProvider;
use crate::types::ServiceError;

/// Hash-derived vectors: identical text always embeds identically and
/// different text almost never collides. Good enough to wire up the pipeline
/// without a network.
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dimensions(8)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..self.dimensions)
            .map(|i| {
                let bits = seed.rotate_left((i as u32 % 64) * 7) ^ ((i as u64) << 17);
                (bits as u32) as f32 / u32::MAX as f32
            })
            .collect()
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}
