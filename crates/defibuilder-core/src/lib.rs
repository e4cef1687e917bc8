pub mod abi;
pub mod audit;
pub mod build;
pub mod contract;
pub mod embed;
pub mod error;
pub mod extract;

pub use abi::{AbiEntry, AbiParam, StateMutability};
pub use audit::{Severity, Vulnerability, parse_findings};
pub use build::{BuildArtifact, BuildResult};
pub use contract::{ContractType, GenerationRequest, PromptTemplate, ReferenceExample, SourceCode};
pub use embed::{Embedder, cosine_sim, normalize};
pub use error::{PipelineError, Service};
pub use extract::extract_code;
