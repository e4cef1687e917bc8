use defibuilder_core::{PipelineError, Service};
use defibuilder_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model returned no choices")]
    EmptyCompletion,
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] StoreError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl AiError {
    /// Map into the pipeline taxonomy. Transport-shaped failures are
    /// attributed to `service`; retrieval failures to the vector index.
    pub fn into_pipeline(self, service: Service) -> PipelineError {
        match self {
            Self::Retrieval(e) => e.into_pipeline(Service::VectorIndex),
            Self::Pipeline(e) => e,
            other => PipelineError::transport(service, other.to_string()),
        }
    }
}
