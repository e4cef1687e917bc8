//! Text embedders: the OpenAI-compatible `/embeddings` client used for live
//! retrieval, and a deterministic feature-hashing embedder for offline runs.

use std::time::Duration;

use async_trait::async_trait;
use defibuilder_core::{Embedder, PipelineError, Service, normalize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AiError;

pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dim: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dim: usize,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dim,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AiError> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        let url = format!("{}/embeddings", self.base_url);
        let mut builder = self.http.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = resp.json().await?;
        collect_ordered(parsed, texts.len(), self.dim)
    }
}

/// Put response rows back into input order and check their shape.
fn collect_ordered(
    response: EmbeddingResponse,
    expected: usize,
    dim: usize,
) -> Result<Vec<Vec<f32>>, AiError> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(PipelineError::transport(
            Service::Embeddings,
            format!("expected {expected} embeddings, got {}", data.len()),
        )
        .into());
    }
    data.sort_by_key(|d| d.index);

    let mut out = Vec::with_capacity(expected);
    for d in data {
        if d.embedding.len() != dim {
            return Err(PipelineError::transport(
                Service::Embeddings,
                format!("expected {dim}-dim embedding, got {}", d.embedding.len()),
            )
            .into());
        }
        let mut v = d.embedding;
        normalize(&mut v);
        out.push(v);
    }
    Ok(out)
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch = texts.len(), "embedding request");
        self.request(texts)
            .await
            .map_err(|e| e.into_pipeline(Service::Embeddings))
    }
}

/// Deterministic bag-of-words embedder. Each lowercased alphanumeric token
/// is hashed (FNV-1a) into one of `dim` buckets; the result is L2-normalized.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) % self.dim as u64) as usize;
            v[bucket] += 1.0;
        }
        normalize(&mut v);
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn fnv1a(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    s.bytes()
        .fold(OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
