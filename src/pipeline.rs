//! The end-to-end run: load, chunk, index, retrieve, answer.

use tracing::info;
use url::Url;

use crate::answerer::Answerer;
use crate::indexer::Indexer;
use crate::ingestion::{PageLoader, TextChunker};
use crate::retriever::Retriever;
use crate::types::{Answer, IndexReport, PipelineError, ScoredChunk};

/// Everything a run produces besides its writes to the index.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub chunk_count: usize,
    pub index_report: IndexReport,
    pub retrieved: Vec<ScoredChunk>,
    pub answer: Answer,
}

/// One linear retrieval-augmented-generation run.
///
/// Components are injected, never ambient: construct the clients once, hand
/// them in, and the pipeline stays testable against in-process fakes. There
/// is no branching and no recovery state; the first failing stage aborts the
/// run and its error names the stage.
pub struct RagPipeline {
    loader: PageLoader,
    chunker: TextChunker,
    indexer: Indexer,
    retriever: Retriever,
    answerer: Answerer,
    selector: String,
}

impl RagPipeline {
    pub fn new(
        loader: PageLoader,
        chunker: TextChunker,
        indexer: Indexer,
        retriever: Retriever,
        answerer: Answerer,
        selector: impl Into<String>,
    ) -> Self {
        Self {
            loader,
            chunker,
            indexer,
            retriever,
            answerer,
            selector: selector.into(),
        }
    }

    /// Runs the five stages in order, aborting on the first failure.
    pub async fn run(&self, url: &Url, question: &str) -> Result<PipelineOutcome, PipelineError> {
        info!(%url, selector = %self.selector, "loading page");
        let documents = self.loader.load(url, &self.selector).await?;

        let chunks = self.chunker.split_documents(&documents);
        info!(count = chunks.len(), "split into chunks");

        let index_report = self.indexer.add_chunks(&chunks).await?;
        info!(%index_report, "indexed chunks");

        let retrieved = self.retriever.retrieve(question).await?;
        info!(count = retrieved.len(), "retrieved context");

        let answer = self.answerer.answer(question, &retrieved).await?;
        info!(chars = answer.text.len(), "generated answer");

        Ok(PipelineOutcome {
            chunk_count: chunks.len(),
            index_report,
            retrieved,
            answer,
        })
    }
}
