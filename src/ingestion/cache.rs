//! Disk-backed cache for fetched pages.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use tokio::fs;
use url::Url;

use crate::types::PipelineError;

/// Stores fetched page bodies under deterministic, URL-derived file names so
/// repeated runs can skip the network.
///
/// The file name combines the URL's last path segment (for a human-readable
/// listing) with a hash of the full URL (so query strings and sibling pages
/// never collide).
#[derive(Clone, Debug)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache file path for a URL. Deterministic across runs.
    pub fn entry_path(&self, url: &Url) -> PathBuf {
        let stem = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(sanitize)
            .unwrap_or_else(|| "index".to_string());
        self.root
            .join(format!("{stem}-{:016x}.html", fingerprint(url.as_str())))
    }

    /// Returns the cached body for `url`, or `None` on a miss.
    pub async fn load(&self, url: &Url) -> Result<Option<String>, PipelineError> {
        let path = self.entry_path(url);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path).await?))
    }

    /// Persists `body` as the cached copy of `url`.
    pub async fn store(&self, url: &Url, body: &str) -> Result<(), PipelineError> {
        let path = self.entry_path(url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, body).await?;
        Ok(())
    }
}

fn fingerprint(input: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    hasher.finish()
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
