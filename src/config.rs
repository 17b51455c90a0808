//! Typed pipeline configuration with fail-fast validation.
//!
//! Every knob the pipeline recognizes lives in [`PipelineConfig`]; service
//! credentials and endpoints come from the environment via
//! [`ServiceConfig::from_env`]. Nothing is read ambiently at module scope.

use std::env;
use std::time::Duration;

use crate::types::PipelineError;

/// Tunables for one pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// CSS selector for text extraction from the fetched page.
    pub selector: String,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters of suffix carried between consecutive chunks.
    pub chunk_overlap: usize,
    /// Upsert batch unit of the vector store.
    pub batch_size: usize,
    /// Maximum batch upserts in flight at once.
    pub max_concurrency: usize,
    /// Number of chunks to retrieve per query.
    pub top_k: usize,
    /// Optional vector index namespace.
    pub namespace: Option<String>,
    /// Bound applied to every external call.
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            selector: "p".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 1000,
            max_concurrency: 5,
            top_k: 2,
            namespace: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Rejects configurations the pipeline must not run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.selector.trim().is_empty() {
            return Err(PipelineError::Config("selector must not be empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(PipelineError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be positive".into()));
        }
        if self.max_concurrency == 0 {
            return Err(PipelineError::Config("max_concurrency must be positive".into()));
        }
        if self.top_k == 0 {
            return Err(PipelineError::Config("top_k must be at least 1".into()));
        }
        Ok(())
    }
}

/// Credentials and endpoints for the external services, read once at startup.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub groq_api_key: String,
    pub mistral_api_key: String,
    pub pinecone_api_key: String,
    pub pinecone_index_host: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        Ok(Self {
            groq_api_key: require("GROQ_API_KEY")?,
            mistral_api_key: require("MISTRAL_API_KEY")?,
            pinecone_api_key: require("PINECONE_API_KEY")?,
            pinecone_index_host: require("PINECONE_INDEX_HOST")?,
        })
    }
}

fn require(name: &str) -> Result<String, PipelineError> {
    env::var(name)
        .map_err(|_| PipelineError::Config(format!("missing environment variable {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PipelineError;

    #[test]
    fn defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let config = PipelineConfig {
            chunk_size: 100,
            chunk_overlap: 150,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let equal = PipelineConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(equal.validate().is_err());
    }

    #[test]
    fn zero_valued_knobs_are_rejected() {
        for config in [
            PipelineConfig {
                chunk_size: 0,
                chunk_overlap: 0,
                ..Default::default()
            },
            PipelineConfig {
                batch_size: 0,
                ..Default::default()
            },
            PipelineConfig {
                max_concurrency: 0,
                ..Default::default()
            },
            PipelineConfig {
                top_k: 0,
                ..Default::default()
            },
            PipelineConfig {
                selector: "  ".into(),
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }
}
