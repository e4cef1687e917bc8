use defibuilder_core::{ContractType, PipelineError, Service};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("catalog file not found: {0}")]
    CatalogNotFound(std::path::PathBuf),

    #[error("no reference example for contract type {0}")]
    MissingReference(ContractType),

    #[error("embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding failed: {0}")]
    Embedding(PipelineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "lancedb")]
    #[error("lancedb error: {0}")]
    Lance(#[from] lancedb::Error),

    #[cfg(feature = "lancedb")]
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Map into the pipeline taxonomy, attributing transport failures to `service`.
    ///
    /// A missing reference means the request named a template the store does
    /// not carry, which is reported as an unsupported contract type.
    pub fn into_pipeline(self, service: Service) -> PipelineError {
        match self {
            Self::MissingReference(t) => PipelineError::UnsupportedContractType(t.to_string()),
            Self::Embedding(e) => e,
            other => PipelineError::transport(service, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reference_maps_to_unsupported_type() {
        let err = StoreError::MissingReference(ContractType::Vault).into_pipeline(Service::ReferenceStore);
        assert_eq!(err, PipelineError::UnsupportedContractType("Vault".into()));
    }

    #[test]
    fn io_maps_to_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StoreError::from(io).into_pipeline(Service::VectorIndex);
        assert!(matches!(
            err,
            PipelineError::Transport {
                service: Service::VectorIndex,
                ..
            }
        ));
    }
}
