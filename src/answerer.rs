//! Prompt assembly and answer generation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::debug;

use crate::types::{Answer, PipelineError, ScoredChunk, ServiceError};

/// The fixed question-answering prompt. `{context}` and `{question}` are the
/// only substitution points.
pub const RAG_PROMPT: &str = "\
Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
Use three sentences maximum and keep the answer as concise as possible.
Always say \"thanks for asking!\" at the end of the answer.

{context}

Question: {question}

Helpful Answer:";

/// Joins retrieved chunk texts in arrival order with single newlines and
/// renders the prompt. Deterministic; an empty context renders an empty
/// block, which is still a valid prompt.
pub fn render_prompt(question: &str, context: &[ScoredChunk]) -> String {
    let joined = context
        .iter()
        .map(|scored| scored.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    RAG_PROMPT
        .replace("{context}", &joined)
        .replace("{question}", question)
}

/// One-shot chat completion against a hosted model.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends one user message and returns the completion text.
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// OpenAI-compatible chat-completions client, pinned to temperature 0 so a
/// fixed prompt yields the most deterministic sampling the service offers.
#[derive(Clone)]
pub struct GroqChat {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
}

impl GroqChat {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
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
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatClient for GroqChat {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ServiceError::Decode("completion contained no content".into()));
        }
        Ok(content)
    }
}

/// Assembles the grounded prompt and asks the chat service for an answer.
pub struct Answerer {
    chat: Arc<dyn ChatClient>,
}

impl Answerer {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    /// Returns the raw completion text, unmodified.
    ///
    /// An empty context still renders a prompt and proceeds; the template
    /// tells the model to admit when it does not know.
    pub async fn answer(
        &self,
        question: &str,
        context: &[ScoredChunk],
    ) -> Result<Answer, PipelineError> {
        let prompt = render_prompt(question, context);
        debug!(
            prompt_chars = prompt.len(),
            context_chunks = context.len(),
            "requesting completion"
        );
        let text = self
            .chat
            .complete(&prompt)
            .await
            .map_err(|err| PipelineError::Generation(err.to_string()))?;
        Ok(Answer { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use serde_json::json;

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            score: 0.9,
            chunk: Chunk {
                id: "id".into(),
                text: text.into(),
                chunk_index: 0,
                metadata: json!({}),
            },
        }
    }

    #[test]
    fn prompt_renders_context_and_question() {
        let context = [scored("alpha chunk"), scored("beta chunk")];
        let prompt = render_prompt("What is alpha?", &context);

        assert!(prompt.contains("alpha chunk\nbeta chunk"));
        assert!(prompt.contains("Question: What is alpha?"));
        assert!(prompt.ends_with("Helpful Answer:"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn empty_context_still_renders_a_valid_prompt() {
        let prompt = render_prompt("Anything?", &[]);
        assert!(prompt.contains("Use the following pieces of context"));
        assert!(prompt.contains("Question: Anything?"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn context_order_is_preserved() {
        let context = [scored("first"), scored("second"), scored("third")];
        let prompt = render_prompt("q", &context);
        let first = prompt.find("first").unwrap();
        let second = prompt.find("second").unwrap();
        let third = prompt.find("third").unwrap();
        assert!(first < second && second < third);
    }
}
