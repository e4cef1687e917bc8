//! Compile outcomes as reported by the compilation service.

use serde::{Deserialize, Serialize};

use crate::{AbiEntry, AbiParam, SourceCode};

/// Compiled interface descriptor plus bytecode.
///
/// Both fields are kept exactly as the compiler returned them; use
/// [`BuildArtifact::interface`] for a typed view of the ABI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub abi: Vec<serde_json::Value>,
    pub bytecode: String,
}

impl BuildArtifact {
    /// Parse the ABI into typed entries. Any malformed entry fails the whole parse.
    pub fn interface(&self) -> Result<Vec<AbiEntry>, serde_json::Error> {
        self.abi
            .iter()
            .map(|entry| serde_json::from_value(entry.clone()))
            .collect()
    }

    /// Constructor parameters, or an empty list when the contract has no
    /// explicit constructor.
    pub fn constructor_inputs(&self) -> Result<Vec<AbiParam>, serde_json::Error> {
        let inputs = self
            .interface()?
            .into_iter()
            .find_map(|entry| match entry {
                AbiEntry::Constructor { inputs, .. } => Some(inputs),
                _ => None,
            })
            .unwrap_or_default();
        Ok(inputs)
    }
}

/// Outcome of one compile attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub success: bool,
    /// Authoritative diagnostic text; fed to the resolver on failure.
    pub message: String,
    pub artifact: Option<BuildArtifact>,
    /// The source that was compiled.
    pub code: SourceCode,
}

impl BuildResult {
    pub fn succeeded(code: SourceCode, message: impl Into<String>, artifact: BuildArtifact) -> Self {
        Self {
            success: true,
            message: message.into(),
            artifact: Some(artifact),
            code,
        }
    }

    pub fn failed(code: SourceCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            artifact: None,
            code,
        }
    }

    /// Artifact of a successful build; `None` for failures.
    pub fn artifact(&self) -> Option<&BuildArtifact> {
        if self.success {
            self.artifact.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn erc20_artifact() -> BuildArtifact {
        BuildArtifact {
            abi: vec![
                json!({
                    "type": "constructor",
                    "stateMutability": "nonpayable",
                    "inputs": [
                        {"name": "name_", "type": "string", "internalType": "string"},
                        {"name": "supply", "type": "uint256", "internalType": "uint256"}
                    ]
                }),
                json!({
                    "type": "function",
                    "name": "mint",
                    "stateMutability": "nonpayable",
                    "inputs": [{"name": "to", "type": "address"}, {"name": "amount", "type": "uint256"}],
                    "outputs": []
                }),
                json!({
                    "type": "event",
                    "name": "Transfer",
                    "anonymous": false,
                    "inputs": [
                        {"name": "from", "type": "address", "indexed": true},
                        {"name": "to", "type": "address", "indexed": true},
                        {"name": "value", "type": "uint256", "indexed": false}
                    ]
                }),
            ],
            bytecode: "0x6080604052".into(),
        }
    }

    #[test]
    fn constructor_inputs_from_abi() {
        let inputs = erc20_artifact().constructor_inputs().unwrap();
        let names: Vec<&str> = inputs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["name_", "supply"]);
        assert_eq!(inputs[1].kind, "uint256");
    }

    #[test]
    fn no_constructor_means_no_inputs() {
        let mut artifact = erc20_artifact();
        artifact.abi.remove(0);
        assert!(artifact.constructor_inputs().unwrap().is_empty());
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let mut artifact = erc20_artifact();
        artifact.abi.push(json!({"type": "function", "inputs": "not-a-list"}));
        assert!(artifact.interface().is_err());
    }

    #[test]
    fn failed_result_hides_artifact() {
        let mut result = BuildResult::succeeded(SourceCode::new("contract A {}"), "ok", erc20_artifact());
        assert!(result.artifact().is_some());
        result.success = false;
        assert!(result.artifact().is_none());
    }
}
