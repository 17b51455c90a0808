//! Ingestion: fetching the source page and splitting it into chunks.
//!
//! * [`loader`] — one HTTP fetch plus CSS-selector text extraction.
//! * [`chunker`] — recursive character splitting with overlap.
//! * [`cache`] — optional disk-backed reuse of previously fetched pages.

pub mod cache;
pub mod chunker;
pub mod loader;

pub use cache::DocumentCache;
pub use chunker::TextChunker;
pub use loader::PageLoader;
