//! In-memory cache in front of an embedding provider.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::EmbeddingProvider;
use crate::types::ServiceError;

/// Memoizes vectors by text so re-embedding the same chunk within a run
/// skips the service call. Hit and miss counters are exposed for logging.
pub struct CachedEmbeddings {
    inner: Arc<dyn EmbeddingProvider>,
    entries: RwLock<HashMap<u64, Vec<f32>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl CachedEmbeddings {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

fn key(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut resolved: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<usize> = Vec::new();
        {
            let entries = self.entries.read();
            for (i, text) in texts.iter().enumerate() {
                match entries.get(&key(text)) {
                    Some(vector) => resolved.push(Some(vector.clone())),
                    None => {
                        resolved.push(None);
                        missing.push(i);
                    }
                }
            }
        }
        self.hits
            .fetch_add(texts.len() - missing.len(), Ordering::Relaxed);
        self.misses.fetch_add(missing.len(), Ordering::Relaxed);

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.inner.embed_batch(&batch).await?;
            if vectors.len() != batch.len() {
                return Err(ServiceError::Decode(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            let mut entries = self.entries.write();
            for (&i, vector) in missing.iter().zip(vectors.into_iter()) {
                entries.insert(key(&texts[i]), vector.clone());
                resolved[i] = Some(vector);
            }
        }

        Ok(resolved
            .into_iter()
            .map(|vector| vector.expect("every index is resolved or fetched"))
            .collect())
    }
}
