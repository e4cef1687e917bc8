use std::sync::Arc;
use std::time::Duration;

use defibuilder_ai::OpenAiEmbedder;
use defibuilder_compiler::DEFAULT_COMPILER_URL;
use defibuilder_core::{Embedder, Service};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A pipeline could not be assembled from its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("live mode requires a vector index")]
    MissingIndex,

    #[error("building {service} client: {message}")]
    Client { service: Service, message: String },
}

impl ConfigError {
    pub(crate) fn client(service: Service, err: impl std::fmt::Display) -> Self {
        Self::Client {
            service,
            message: err.to_string(),
        }
    }
}

/// Whether model-backed stages call real services or return canned output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Live,
    /// Canned generator, resolver, and auditor. The compiler stays live.
    Offline,
}

/// Run policy. `mode` decides which stage implementations a
/// [`Pipeline`](crate::Pipeline) drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Resolve-and-recompile cycles allowed after the first failed compile.
    pub max_retries: usize,
    /// Treat an audit failure as a failed run instead of a missing report.
    pub audit_required: bool,
    pub mode: Mode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            audit_required: false,
            mode: Mode::Live,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_audit_required(mut self, required: bool) -> Self {
        self.audit_required = required;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// Endpoints, credentials, and model names for external services.
///
/// Keys are never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub openai_base_url: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub compiler_url: String,
    #[serde(skip_serializing)]
    pub compiler_api_key: Option<String>,
    /// Per-request timeout in milliseconds applied to every HTTP client.
    /// `None` means no limit.
    pub request_timeout_ms: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".into(),
            openai_api_key: None,
            chat_model: "gpt-4-1106-preview".into(),
            embedding_model: "text-embedding-ada-002".into(),
            embedding_dim: 1536,
            compiler_url: DEFAULT_COMPILER_URL.into(),
            compiler_api_key: None,
            request_timeout_ms: None,
        }
    }
}

impl ServiceConfig {
    pub fn with_openai_api_key(mut self, key: Option<String>) -> Self {
        self.openai_api_key = key;
        self
    }

    pub fn with_compiler_api_key(mut self, key: Option<String>) -> Self {
        self.compiler_api_key = key;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_ms = timeout
            .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX).max(1));
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Embeddings client for `embedding_model` at `embedding_dim`.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>, ConfigError> {
        let mut embedder = OpenAiEmbedder::new(
            &self.openai_base_url,
            self.openai_api_key.clone(),
            &self.embedding_model,
            self.embedding_dim,
        );
        if let Some(timeout) = self.request_timeout() {
            embedder = embedder
                .with_timeout(timeout)
                .map_err(|e| ConfigError::client(Service::Embeddings, e))?;
        }
        Ok(Arc::new(embedder))
    }
}
