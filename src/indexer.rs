//! Batched, bounded-concurrency indexing of chunks into the vector store.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::embeddings::EmbeddingProvider;
use crate::stores::{VectorRecord, VectorStore};
use crate::types::{BatchFailure, Chunk, IndexReport, PipelineError};

/// Writes chunks to the vector store in bounded-size batches: each batch is
/// embedded, then upserted, with at most `max_concurrency` batches in flight
/// at once. The stage waits for every batch before the pipeline moves on.
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrency: usize,
    namespace: Option<String>,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        max_concurrency: usize,
    ) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be positive".into()));
        }
        if max_concurrency == 0 {
            return Err(PipelineError::Config(
                "max_concurrency must be positive".into(),
            ));
        }
        Ok(Self {
            store,
            embeddings,
            batch_size,
            max_concurrency,
            namespace: None,
        })
    }

    /// Direct all upserts into an index namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Embeds and upserts every chunk.
    ///
    /// On success the full [`IndexReport`] is returned. When any batch fails
    /// the report travels inside [`PipelineError::Index`] instead, so partial
    /// progress stays visible and the caller decides what to retry. This
    /// layer gives no exactly-once guarantee; the chunk-derived ids make
    /// retried upserts idempotent.
    pub async fn add_chunks(&self, chunks: &[Chunk]) -> Result<IndexReport, PipelineError> {
        let (kept, skipped): (Vec<&Chunk>, Vec<&Chunk>) = chunks
            .iter()
            .partition(|chunk| !chunk.text.trim().is_empty());

        let batches: Vec<Vec<&Chunk>> = kept
            .chunks(self.batch_size)
            .map(|batch| batch.to_vec())
            .collect();
        let batches_submitted = batches.len();

        let results: Vec<Result<usize, BatchFailure>> =
            stream::iter(batches.into_iter().enumerate())
                .map(|(batch_index, batch)| self.index_batch(batch_index, batch))
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;

        let mut report = IndexReport {
            batches_submitted,
            skipped_empty: skipped.len(),
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(count) => {
                    report.batches_committed += 1;
                    report.chunks_indexed += count;
                }
                Err(failure) => report.failures.push(failure),
            }
        }
        report.failures.sort_by_key(|failure| failure.batch);

        if report.is_complete() {
            info!(
                batches = report.batches_committed,
                chunks = report.chunks_indexed,
                skipped = report.skipped_empty,
                "indexing complete"
            );
            Ok(report)
        } else {
            warn!(
                failed = report.failures.len(),
                committed = report.batches_committed,
                "indexing incomplete"
            );
            Err(PipelineError::Index(report))
        }
    }

    async fn index_batch(
        &self,
        batch_index: usize,
        batch: Vec<&Chunk>,
    ) -> Result<usize, BatchFailure> {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self
            .embeddings
            .embed_batch(&texts)
            .await
            .map_err(|err| BatchFailure {
                batch: batch_index,
                reason: format!("embedding: {err}"),
            })?;
        if vectors.len() != batch.len() {
            return Err(BatchFailure {
                batch: batch_index,
                reason: format!(
                    "embedding count mismatch: {} texts, {} vectors",
                    batch.len(),
                    vectors.len()
                ),
            });
        }

        let records: Vec<VectorRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, values)| VectorRecord::from_chunk(chunk, values))
            .collect();
        self.store
            .upsert(&records, self.namespace.as_deref())
            .await
            .map_err(|err| BatchFailure {
                batch: batch_index,
                reason: format!("upsert: {err}"),
            })?;
        Ok(records.len())
    }
}
