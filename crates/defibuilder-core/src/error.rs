use serde::Serialize;
use thiserror::Error;

/// External collaborator that produced a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    ReferenceStore,
    VectorIndex,
    Embeddings,
    Model,
    Compiler,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReferenceStore => "reference store",
            Self::VectorIndex => "vector index",
            Self::Embeddings => "embeddings",
            Self::Model => "model",
            Self::Compiler => "compiler",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-stage failure taxonomy recorded on a pipeline run.
///
/// Each crate keeps its own error enum and converts into this one at the
/// stage boundary, so a finished run only ever carries these four shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum PipelineError {
    #[error("{service} transport error: {message}")]
    Transport { service: Service, message: String },

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("compilation did not succeed after {attempts} attempts: {last_message}")]
    RetryBudgetExhausted { attempts: usize, last_message: String },

    #[error("unsupported contract type: {0}")]
    UnsupportedContractType(String),
}

impl PipelineError {
    pub fn transport(service: Service, message: impl Into<String>) -> Self {
        Self::Transport {
            service,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
