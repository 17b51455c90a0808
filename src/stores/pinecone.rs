//! REST client for a managed Pinecone-style index.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::debug;

use super::{IndexStats, QueryMatch, VectorRecord, VectorStore};
use crate::types::ServiceError;

/// Metadata key carrying the chunk text, the same convention the managed
/// store's own client libraries use.
const TEXT_KEY: &str = "text";

/// Client for one index, addressed by its host URL.
#[derive(Clone)]
pub struct PineconeStore {
    client: Client,
    host: String,
    api_key: String,
    request_timeout: Duration,
}

impl PineconeStore {
    pub fn new(client: Client, host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ServiceError> {
        let url = format!("{}{}", self.host, path);
        let send = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
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
        Ok(response)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(
        &self,
        records: &[VectorRecord],
        namespace: Option<&str>,
    ) -> Result<(), ServiceError> {
        if records.is_empty() {
            return Ok(());
        }
        let vectors: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                let mut metadata = record.metadata.clone();
                if let serde_json::Value::Object(map) = &mut metadata {
                    map.insert(TEXT_KEY.into(), record.text.clone().into());
                }
                json!({
                    "id": record.id,
                    "values": record.values,
                    "metadata": metadata,
                })
            })
            .collect();
        let mut body = json!({ "vectors": vectors });
        if let Some(namespace) = namespace {
            body["namespace"] = namespace.into();
        }

        debug!(count = records.len(), "upserting vectors");
        self.post("/vectors/upsert", body).await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<QueryMatch>, ServiceError> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        if let Some(namespace) = namespace {
            body["namespace"] = namespace.into();
        }

        let response = self.post("/query", body).await?;
        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))?;

        Ok(payload
            .matches
            .into_iter()
            .map(|m| {
                let mut metadata = m.metadata.unwrap_or_else(|| json!({}));
                let text = match &mut metadata {
                    serde_json::Value::Object(map) => match map.remove(TEXT_KEY) {
                        Some(serde_json::Value::String(text)) => text,
                        _ => String::new(),
                    },
                    _ => String::new(),
                };
                QueryMatch {
                    id: m.id,
                    score: m.score,
                    text,
                    metadata,
                }
            })
            .collect())
    }

    async fn stats(&self) -> Result<IndexStats, ServiceError> {
        let response = self.post("/describe_index_stats", json!({})).await?;
        let payload: StatsResponse = response
            .json()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))?;
        Ok(IndexStats {
            vector_count: payload.total_vector_count.unwrap_or(0),
        })
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Deserialize)]
struct WireMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StatsResponse {
    #[serde(rename = "totalVectorCount")]
    total_vector_count: Option<usize>,
}
