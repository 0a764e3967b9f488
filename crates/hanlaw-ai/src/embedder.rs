//! Embedding providers.
//!
//! The pipeline treats the model as an opaque text→vector function, so the
//! only contract here is [`Embedder`]: deterministic output for a fixed
//! model and input, no side effects. [`HttpEmbedder`] talks to an
//! Ollama-compatible `/api/embeddings` endpoint; [`MockEmbedder`] derives
//! vectors from a hash for tests and dry runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    WrongDim { expected: usize, got: usize },
}

/// Text → fixed-dimension vector.
///
/// Implementations must be deterministic for identical model version and
/// input, and must not persist anything.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality.
    fn dim(&self) -> usize;

    /// Embed one text, returning a `dim()`-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed(text).await
    }
}

/// Connection settings for the embedding server, scoped to one run.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Server base URL, no trailing slash needed.
    pub base_url: String,
    /// Model name the server should load.
    pub model: String,
    /// Expected vector length; responses with any other length are rejected.
    pub dim: usize,
    pub timeout: Duration,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "jhgan/ko-sroberta-multitask".to_string(),
            dim: 768,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Embedding client for an Ollama-compatible HTTP model server.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbedConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: EmbedConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config: EmbedConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dim(&self) -> usize {
        self.config.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        debug!(url = %url, chars = text.len(), "requesting embedding");

        let resp = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.config.model,
                prompt: text,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = resp.json().await?;
        if parsed.embedding.len() != self.config.dim {
            return Err(EmbedError::WrongDim {
                expected: self.config.dim,
                got: parsed.embedding.len(),
            });
        }
        Ok(parsed.embedding)
    }
}

/// Deterministic stand-in embedder.
///
/// Vectors are derived from a hash of the input text and L2-normalised,
/// so identical texts embed identically and distinct texts rarely collide.
pub struct MockEmbedder {
    dim: usize,
}

impl MockEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        use std::hash::{DefaultHasher, Hash, Hasher};

        let mut v = Vec::with_capacity(self.dim);
        for i in 0..self.dim {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            // Map the hash onto [-1, 1).
            v.push((hasher.finish() % 2000) as f32 / 1000.0 - 1.0);
        }
        normalize(&mut v);
        Ok(v)
    }
}

/// L2-normalise a vector in place.
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
