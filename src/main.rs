use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use reqwest::Client;
use tracing::error;
use tracing_subscriber::FmtSubscriber;
use url::Url;

use ragline::answerer::{Answerer, GroqChat};
use ragline::config::{PipelineConfig, ServiceConfig};
use ragline::embeddings::{CachedEmbeddings, MistralEmbeddings};
use ragline::indexer::Indexer;
use ragline::ingestion::{DocumentCache, PageLoader, TextChunker};
use ragline::pipeline::RagPipeline;
use ragline::retriever::Retriever;
use ragline::stores::{PineconeStore, VectorStore};
use ragline::types::PipelineError;

const DEFAULT_PAGE_URL: &str = "https://lilianweng.github.io/posts/2023-06-23-agent/";
const DEFAULT_QUESTION: &str = "What is Task Decomposition?";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(stage = err.stage(), "pipeline aborted: {err}");
            eprintln!("pipeline failed in {} stage: {err}", err.stage());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), PipelineError> {
    let services = ServiceConfig::from_env()?;
    let mut config = PipelineConfig::default();
    if let Ok(selector) = env::var("RAGLINE_SELECTOR") {
        config.selector = selector;
    }
    if let Ok(namespace) = env::var("RAGLINE_NAMESPACE") {
        config.namespace = Some(namespace);
    }
    config.validate()?;

    let page_url = env::var("RAGLINE_PAGE_URL").unwrap_or_else(|_| DEFAULT_PAGE_URL.to_string());
    let page_url = Url::parse(&page_url)
        .map_err(|err| PipelineError::Config(format!("invalid page URL: {err}")))?;
    let question = env::var("RAGLINE_QUESTION").unwrap_or_else(|_| DEFAULT_QUESTION.to_string());

    let client = Client::builder()
        .user_agent(concat!("ragline/", env!("CARGO_PKG_VERSION")))
        .use_rustls_tls()
        .timeout(config.request_timeout)
        .build()
        .map_err(|err| PipelineError::Config(format!("http client: {err}")))?;

    let mut loader = PageLoader::new(client.clone(), config.request_timeout);
    if let Ok(dir) = env::var("RAGLINE_CACHE_DIR") {
        loader = loader.with_cache(DocumentCache::new(dir));
    }

    let embeddings = Arc::new(CachedEmbeddings::new(Arc::new(MistralEmbeddings::new(
        client.clone(),
        services.mistral_api_key,
    ))));
    let store = Arc::new(PineconeStore::new(
        client.clone(),
        services.pinecone_index_host,
        services.pinecone_api_key,
    ));

    let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
    let mut indexer = Indexer::new(
        store.clone(),
        embeddings.clone(),
        config.batch_size,
        config.max_concurrency,
    )?;
    let mut retriever = Retriever::new(store.clone(), embeddings.clone(), config.top_k)?;
    if let Some(namespace) = &config.namespace {
        indexer = indexer.with_namespace(namespace.clone());
        retriever = retriever.with_namespace(namespace.clone());
    }
    let answerer = Answerer::new(Arc::new(GroqChat::new(client, services.groq_api_key)));

    let pipeline = RagPipeline::new(
        loader,
        chunker,
        indexer,
        retriever,
        answerer,
        config.selector.clone(),
    );
    let outcome = pipeline.run(&page_url, &question).await?;

    println!("chunks indexed : {}", outcome.index_report.chunks_indexed);
    match store.stats().await {
        Ok(stats) => println!("index vectors  : {}", stats.vector_count),
        Err(err) => tracing::warn!("could not read index stats: {err}"),
    }
    println!("context chunks : {}", outcome.retrieved.len());
    for scored in &outcome.retrieved {
        println!("  [{:.3}] {}", scored.score, preview(&scored.chunk.text, 80));
    }
    println!("\n{}", outcome.answer.text);
    Ok(())
}

fn preview(text: &str, limit: usize) -> String {
    let mut out: String = text.chars().take(limit).collect();
    if text.chars().count() > limit {
        out.push('…');
    }
    out
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
