//! REST client for the hosted embedding service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::debug;

use super::EmbeddingProvider;
use crate::types::ServiceError;

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";
pub const DEFAULT_MODEL: &str = "mistral-embed";

/// Client for the Mistral `/v1/embeddings` endpoint.
///
/// The base URL is configurable so tests can point the client at a mock
/// server.
#[derive(Clone)]
pub struct MistralEmbeddings {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
}

impl MistralEmbeddings {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": inputs }))
            .send();
        let response = timeout(self.request_timeout, send)
            .await
            .map_err(|_| ServiceError::Timeout(self.request_timeout))??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))?;
        let mut data = payload.data;
        data.sort_by_key(|item| item.index);
        if data.len() != inputs.len() {
            return Err(ServiceError::Decode(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                data.len()
            )));
        }
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for MistralEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.model, "embedding batch");
        self.request(texts).await
    }
}
