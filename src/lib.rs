//! Retrieval-augmented generation as a straight line.
//!
//! ```text
//! PageLoader ──► TextChunker ──► Indexer ──► Retriever ──► Answerer
//!   (fetch)       (split)     (embed+upsert)  (top-k)    (prompt+LLM)
//! ```
//!
//! Each stage consumes the previous stage's output; the only fan-out is the
//! indexer's bounded concurrent batch upserts. External services sit behind
//! the [`embeddings::EmbeddingProvider`], [`stores::VectorStore`], and
//! [`answerer::ChatClient`] seams so tests can swap in deterministic fakes.

pub mod answerer;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod ingestion;
pub mod pipeline;
pub mod retriever;
pub mod stores;
pub mod types;

pub use answerer::{Answerer, ChatClient, GroqChat};
pub use config::{PipelineConfig, ServiceConfig};
pub use embeddings::{CachedEmbeddings, EmbeddingProvider, MistralEmbeddings, MockEmbeddingProvider};
pub use indexer::Indexer;
pub use ingestion::{DocumentCache, PageLoader, TextChunker};
pub use pipeline::{PipelineOutcome, RagPipeline};
pub use retriever::Retriever;
pub use stores::{PineconeStore, VectorStore};
pub use types::{Answer, Chunk, Document, IndexReport, PipelineError, ScoredChunk, ServiceError};
