//! Request-side types: contract categories, reference examples, generation requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Closed set of contract templates the generator knows how to customise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractType {
    Token,
    #[serde(rename = "NFT")]
    Nft,
    Edition,
    Vault,
    Marketplace,
    Exchange,
}

impl ContractType {
    pub const ALL: [ContractType; 6] = [
        Self::Token,
        Self::Nft,
        Self::Edition,
        Self::Vault,
        Self::Marketplace,
        Self::Exchange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "Token",
            Self::Nft => "NFT",
            Self::Edition => "Edition",
            Self::Vault => "Vault",
            Self::Marketplace => "Marketplace",
            Self::Exchange => "Exchange",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = PipelineError;

    /// Case-insensitive match against the template names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PipelineError::UnsupportedContractType(wanted.to_string()))
    }
}

/// Canonical source snippet for a contract type, supplied by the reference store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceExample(pub String);

impl ReferenceExample {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A candidate contract implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceCode(String);

impl SourceCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Name of the first `contract` declared in the source, if any.
    pub fn contract_name(&self) -> Option<&str> {
        self.0.lines().find_map(|line| {
            let rest = line
                .trim_start()
                .strip_prefix("abstract ")
                .unwrap_or(line.trim_start())
                .strip_prefix("contract ")?;
            let name: &str = rest
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .next()?;
            (!name.is_empty()).then_some(name)
        })
    }
}

impl From<String> for SourceCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for SourceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User intent: which template to start from and how to customise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Free-form customization text. May be empty.
    pub customization: String,
    pub contract_type: ContractType,
}

impl GenerationRequest {
    pub fn new(contract_type: ContractType, customization: impl Into<String>) -> Self {
        Self {
            customization: customization.into(),
            contract_type,
        }
    }

    /// Build a request from an untyped template name, rejecting unknown types.
    pub fn parse(contract_type: &str, customization: impl Into<String>) -> Result<Self, PipelineError> {
        Ok(Self::new(contract_type.parse()?, customization))
    }
}

/// Predefined customization prompt offered for a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub template: ContractType,
    pub text: String,
}
