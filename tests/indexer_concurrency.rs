//! Batch accounting and the concurrency ceiling of the indexer, proven with
//! an in-process store stub instrumented with atomic gauges.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use ragline::embeddings::MockEmbeddingProvider;
use ragline::indexer::Indexer;
use ragline::stores::{IndexStats, QueryMatch, VectorRecord, VectorStore};
use ragline::types::{Chunk, PipelineError, ServiceError};

/// Records call counts and the peak number of concurrent upserts.
#[derive(Default)]
struct GaugeStore {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl VectorStore for GaugeStore {
    async fn upsert(
        &self,
        _records: &[VectorRecord],
        _namespace: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // Holds the slot long enough for other batches to pile up.
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, ServiceError> {
        Ok(Vec::new())
    }

    async fn stats(&self) -> Result<IndexStats, ServiceError> {
        Ok(IndexStats::default())
    }
}

/// Fails every second upsert so half the batches come back in the report.
#[derive(Default)]
struct FlakyStore {
    calls: AtomicUsize,
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn upsert(
        &self,
        _records: &[VectorRecord],
        _namespace: Option<&str>,
    ) -> Result<(), ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 1 {
            return Err(ServiceError::Api {
                status: 500,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, ServiceError> {
        Ok(Vec::new())
    }

    async fn stats(&self) -> Result<IndexStats, ServiceError> {
        Ok(IndexStats::default())
    }
}

fn chunks(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| Chunk {
            id: format!("chunk-{i}"),
            text: format!("chunk body {i}"),
            chunk_index: i,
            metadata: json!({"source": "https://example.com/doc"}),
        })
        .collect()
}

#[tokio::test]
async fn batch_count_is_ceil_of_chunks_over_batch_size() {
    let store = Arc::new(GaugeStore::default());
    let embeddings = Arc::new(MockEmbeddingProvider::new());
    let indexer = Indexer::new(store.clone(), embeddings, 10, 5).unwrap();

    let report = indexer.add_chunks(&chunks(42)).await.unwrap();

    // ceil(42 / 10) = 5 batches, all committed.
    assert_eq!(report.batches_submitted, 5);
    assert_eq!(report.batches_committed, 5);
    assert_eq!(report.chunks_indexed, 42);
    assert!(report.is_complete());
    assert_eq!(store.calls.load(Ordering::SeqCst), 5);
    assert!(store.peak.load(Ordering::SeqCst) <= 5);
}

#[tokio::test]
async fn concurrency_never_exceeds_the_configured_ceiling() {
    let store = Arc::new(GaugeStore::default());
    let embeddings = Arc::new(MockEmbeddingProvider::new());
    let indexer = Indexer::new(store.clone(), embeddings, 1, 3).unwrap();

    let report = indexer.add_chunks(&chunks(12)).await.unwrap();

    assert_eq!(report.batches_submitted, 12);
    assert_eq!(store.calls.load(Ordering::SeqCst), 12);
    assert!(
        store.peak.load(Ordering::SeqCst) <= 3,
        "peak {} exceeded the ceiling",
        store.peak.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn failed_batches_are_reported_not_swallowed() {
    let store = Arc::new(FlakyStore::default());
    let embeddings = Arc::new(MockEmbeddingProvider::new());
    // Serial so the alternating failure pattern is deterministic per batch.
    let indexer = Indexer::new(store, embeddings, 5, 1).unwrap();

    let err = indexer.add_chunks(&chunks(20)).await.unwrap_err();

    assert_eq!(err.stage(), "indexer");
    match err {
        PipelineError::Index(report) => {
            assert_eq!(report.batches_submitted, 4);
            assert_eq!(report.batches_committed, 2);
            assert_eq!(report.chunks_indexed, 10);
            assert_eq!(report.failures.len(), 2);
            for failure in &report.failures {
                assert!(failure.reason.contains("500"));
            }
        }
        other => panic!("expected an index error, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_chunks_are_skipped_and_counted() {
    let store = Arc::new(GaugeStore::default());
    let embeddings = Arc::new(MockEmbeddingProvider::new());
    let indexer = Indexer::new(store.clone(), embeddings, 10, 2).unwrap();

    let mut input = chunks(3);
    input.push(Chunk {
        id: "blank".into(),
        text: "   ".into(),
        chunk_index: 3,
        metadata: json!({}),
    });

    let report = indexer.add_chunks(&input).await.unwrap();
    assert_eq!(report.chunks_indexed, 3);
    assert_eq!(report.skipped_empty, 1);
}

#[tokio::test]
async fn no_chunks_means_no_upserts() {
    let store = Arc::new(GaugeStore::default());
    let embeddings = Arc::new(MockEmbeddingProvider::new());
    let indexer = Indexer::new(store.clone(), embeddings, 10, 2).unwrap();

    let report = indexer.add_chunks(&[]).await.unwrap();
    assert_eq!(report.batches_submitted, 0);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}
