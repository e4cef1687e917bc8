//! Security auditor: asks the model for findings as a JSON object and
//! validates the reply against the vulnerability schema.

use std::sync::Arc;

use defibuilder_core::{SourceCode, Vulnerability, parse_findings};
use tracing::{info, warn};

use crate::{AiError, ChatModel, Prompt, SamplingOptions};

const SYSTEM_MESSAGE: &str = r#"You are a smart contract security auditor. Review the Solidity code you receive and report its vulnerabilities. Respond ONLY with a JSON object of the form {"audits": [{"title": string, "description": string, "severity": "High" | "Medium" | "Low"}]}. Return {"audits": []} when you find nothing."#;

pub struct Auditor {
    model: Arc<dyn ChatModel>,
    sampling: SamplingOptions,
}

impl Auditor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            sampling: SamplingOptions {
                temperature: 0.2,
                seed: Some(1337),
                json: true,
            },
        }
    }

    pub async fn audit(&self, code: &SourceCode) -> Result<Vec<Vulnerability>, AiError> {
        let prompt = Prompt::new()
            .system(SYSTEM_MESSAGE)
            .user(format!("Code:\n{}", code.as_str()));
        let reply = self.model.invoke(&prompt, &self.sampling).await?;
        match parse_findings(&reply) {
            Ok(findings) => {
                info!(findings = findings.len(), "audit complete");
                Ok(findings)
            }
            Err(e) => {
                warn!(error = %e, "audit reply failed validation");
                Err(e.into())
            }
        }
    }
}
