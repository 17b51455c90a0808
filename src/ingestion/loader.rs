//! Fetches one web page and extracts the text behind a CSS selector.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::json;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::ingestion::cache::DocumentCache;
use crate::types::{Document, PipelineError};

/// Loads a page and turns the elements matching a selector into one
/// [`Document`].
///
/// Failure policy: an unreachable page, a non-success status, and a selector
/// that matches nothing are all loader failures. No retry is attempted; the
/// per-call timeout is the only resilience.
pub struct PageLoader {
    client: Client,
    request_timeout: Duration,
    cache: Option<DocumentCache>,
}

impl PageLoader {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
            cache: None,
        }
    }

    /// Reuse previously fetched pages from a disk cache.
    #[must_use]
    pub fn with_cache(mut self, cache: DocumentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fetches `url` and extracts the text of every element matching `css`.
    ///
    /// Yields one [`Document`] per page, with `{"source": <url>}` metadata.
    pub async fn load(&self, url: &Url, css: &str) -> Result<Vec<Document>, PipelineError> {
        let selector = Selector::parse(css)
            .map_err(|err| PipelineError::Config(format!("invalid CSS selector '{css}': {err}")))?;

        let body = self.fetch(url).await?;
        let texts = select_text(&body, &selector);
        if texts.is_empty() {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                reason: format!("selector '{css}' matched no elements"),
            });
        }

        let document = Document::new(texts.join("\n\n"), json!({ "source": url.to_string() }));
        debug!(%url, bytes = document.text.len(), elements = texts.len(), "loaded page");
        Ok(vec![document])
    }

    async fn fetch(&self, url: &Url) -> Result<String, PipelineError> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.load(url).await? {
                debug!(%url, "serving page from cache");
                return Ok(body);
            }
        }

        let body = timeout(self.request_timeout, self.fetch_remote(url))
            .await
            .map_err(|_| PipelineError::Fetch {
                url: url.to_string(),
                reason: format!("timed out after {:?}", self.request_timeout),
            })??;

        if let Some(cache) = &self.cache {
            cache.store(url, &body).await?;
        }
        Ok(body)
    }

    async fn fetch_remote(&self, url: &Url) -> Result<String, PipelineError> {
        let fetch_err = |err: reqwest::Error| PipelineError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?;
        response.text().await.map_err(fetch_err)
    }
}

/// Extracts the whitespace-normalized text of every matching element, in
/// document order, skipping elements that render to nothing.
fn select_text(body: &str, selector: &Selector) -> Vec<String> {
    let page = Html::parse_document(body);
    page.select(selector)
        .filter_map(|element| {
            let text = normalize_whitespace(&element.text().collect::<String>());
            (!text.is_empty()).then_some(text)
        })
        .collect()
}

fn normalize_whitespace(text: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
    ws.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_runs_of_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\t b   c "), "a b c");
        assert_eq!(normalize_whitespace("\n \t"), "");
    }

    #[test]
    fn select_text_extracts_only_matching_elements() {
        let html = r#"<html><body>
            <p>First  paragraph.</p>
            <div>skipped</div>
            <p>Second
            paragraph.</p>
            <p>   </p>
        </body></html>"#;
        let selector = Selector::parse("p").unwrap();

        let texts = select_text(html, &selector);
        assert_eq!(texts, vec!["First paragraph.", "Second paragraph."]);
    }

    #[test]
    fn select_text_flattens_nested_markup() {
        let html = "<p>An <em>emphasized</em> word</p>";
        let selector = Selector::parse("p").unwrap();
        assert_eq!(select_text(html, &selector), vec!["An emphasized word"]);
    }
}
