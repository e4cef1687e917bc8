//! HTTP client for the remote Solidity compilation service.
//!
//! Every failure (network, non-2xx status, unreadable body, success reported
//! without an artifact) is folded into a failed [`BuildResult`] whose message
//! is the diagnostic handed to the resolver.

use std::time::Duration;

use defibuilder_core::{BuildArtifact, BuildResult, PipelineError, Service, SourceCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_COMPILER_URL: &str = "https://compiler-service.defibuilder.com/api/v1/solidity";

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("compiler service returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("malformed compiler response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compiler reported success without an artifact")]
    MissingArtifact,
}

impl From<CompileError> for PipelineError {
    fn from(e: CompileError) -> Self {
        PipelineError::transport(Service::Compiler, e.to_string())
    }
}

#[derive(Serialize)]
struct CompileRequest<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct CompileResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    artifact: Option<BuildArtifact>,
}

pub struct HttpCompiler {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpCompiler {
    /// `url` is the full compile endpoint, e.g. [`DEFAULT_COMPILER_URL`].
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, CompileError> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Compile `code`. Never fails: transport problems become a failed result.
    pub async fn compile(&self, code: &SourceCode) -> BuildResult {
        info!(url = %self.url, contract = code.contract_name().unwrap_or("<unnamed>"), "compiling");
        let result = match self.post(code).await {
            Ok((status, body)) => interpret(code.clone(), status, &body),
            Err(e) => BuildResult::failed(code.clone(), PipelineError::from(e).to_string()),
        };
        if result.success {
            info!("compilation succeeded");
        } else {
            warn!(message = %result.message, "compilation failed");
        }
        result
    }

    async fn post(&self, code: &SourceCode) -> Result<(u16, String), CompileError> {
        let mut builder = self.client.post(&self.url).json(&CompileRequest {
            code: code.as_str(),
        });
        if let Some(key) = &self.api_key {
            builder = builder.header("X-API-KEY", key);
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

/// Map a raw HTTP exchange onto a [`BuildResult`].
fn interpret(code: SourceCode, status: u16, body: &str) -> BuildResult {
    match parse_response(status, body) {
        Ok(resp) if resp.success => match resp.artifact {
            Some(artifact) => BuildResult::succeeded(code, resp.message, artifact),
            None => BuildResult::failed(code, CompileError::MissingArtifact.to_string()),
        },
        Ok(resp) => BuildResult::failed(code, resp.message),
        Err(e) => BuildResult::failed(code, PipelineError::from(e).to_string()),
    }
}

fn parse_response(status: u16, body: &str) -> Result<CompileResponse, CompileError> {
    if !(200..300).contains(&status) {
        // Keep the service's own diagnostic when the error body carries one.
        let body = serde_json::from_str::<CompileResponse>(body)
            .ok()
            .map(|r| r.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.to_string());
        return Err(CompileError::Server { status, body });
    }
    Ok(serde_json::from_str(body)?)
}
