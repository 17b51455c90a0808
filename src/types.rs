//! Core data model and the two-tier error taxonomy.
//!
//! [`ServiceError`] covers the transport layer shared by every external
//! client (HTTP failures, bad statuses, undecodable bodies, timeouts).
//! [`PipelineError`] is the stage-level taxonomy the pipeline propagates:
//! each variant names the stage that produced it, and [`PipelineError::stage`]
//! turns that into the label printed when a run aborts.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw document produced by the loader. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    /// Free-form metadata; the loader records at least `{"source": <url>}`.
    pub metadata: serde_json::Value,
}

impl Document {
    pub fn new(text: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Source URL recorded by the loader, if present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|value| value.as_str())
    }
}

/// A bounded text window cut from a document, the unit of embedding and
/// retrieval.
///
/// The id is derived deterministically from (source, position) so re-indexing
/// the same page upserts in place instead of duplicating records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// Zero-based position of this chunk within its parent document.
    pub chunk_index: usize,
    /// Inherited from the parent document.
    pub metadata: serde_json::Value,
}

/// A retrieved chunk with its similarity score.
#[derive(Clone, Debug)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// The generated answer. Derived, never persisted.
#[derive(Clone, Debug)]
pub struct Answer {
    pub text: String,
}

/// Transport-level failure talking to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("call exceeded {0:?}")]
    Timeout(Duration),
}

/// One failed indexing batch.
#[derive(Clone, Debug)]
pub struct BatchFailure {
    /// Zero-based batch index within the submission.
    pub batch: usize,
    pub reason: String,
}

/// Outcome of an indexing run, committed and failed batches alike.
///
/// Partial success is normal vocabulary here: the report stays attached to
/// [`PipelineError::Index`] so callers can see what committed and decide what
/// to retry.
#[derive(Clone, Debug, Default)]
pub struct IndexReport {
    pub batches_submitted: usize,
    pub batches_committed: usize,
    pub chunks_indexed: usize,
    /// Chunks dropped before batching because their text was blank.
    pub skipped_empty: usize,
    pub failures: Vec<BatchFailure>,
}

impl IndexReport {
    /// `true` when every submitted batch committed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} batches committed ({} chunks)",
            self.batches_committed, self.batches_submitted, self.chunks_indexed
        )?;
        if !self.failures.is_empty() {
            let failed: Vec<String> = self
                .failures
                .iter()
                .map(|failure| format!("#{}: {}", failure.batch, failure.reason))
                .collect();
            write!(f, "; failed [{}]", failed.join(", "))?;
        }
        Ok(())
    }
}

/// Stage-level pipeline failure. Propagated unchanged to the entry point;
/// there is no recovery below the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("indexing incomplete: {0}")]
    Index(IndexReport),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] ServiceError),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch { .. } | Self::Io(_) => "loader",
            Self::Config(_) => "config",
            Self::Index(_) => "indexer",
            Self::Retrieval(_) => "retriever",
            Self::Generation(_) => "answerer",
        }
    }
}
