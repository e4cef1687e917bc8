//! Fixed stand-ins for the model-backed agents, used in offline mode.
//!
//! The canned generator returns a contract missing its closing brace so an
//! offline run still exercises the compile and resolve path; the canned
//! resolver returns a contract that compiles.

use defibuilder_core::{GenerationRequest, ReferenceExample, Severity, SourceCode, Vulnerability};
use tracing::debug;

pub const CANNED_BROKEN_SOURCE: &str =
    "pragma solidity ^0.8.0;\n\ncontract MyContract {\n\n // Put a \"}\" here to solve compilation error\n";

pub const CANNED_FIXED_SOURCE: &str = "pragma solidity ^0.8.0;\n\ncontract MyContract {\n}\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct CannedGenerator;

impl CannedGenerator {
    pub async fn generate(&self, request: &GenerationRequest, _reference: &ReferenceExample) -> SourceCode {
        debug!(contract_type = %request.contract_type, "canned generation");
        SourceCode::new(CANNED_BROKEN_SOURCE)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CannedResolver;

impl CannedResolver {
    pub async fn resolve(&self, _code: &SourceCode, diagnostic: &str) -> SourceCode {
        debug!(diagnostic, "canned resolution");
        SourceCode::new(CANNED_FIXED_SOURCE)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CannedAuditor;

impl CannedAuditor {
    pub async fn audit(&self, _code: &SourceCode) -> Vec<Vulnerability> {
        vec![Vulnerability {
            title: "Vulnerability 1".into(),
            description: "Description of vulnerability 1".into(),
            severity: Severity::Medium,
        }]
    }
}
