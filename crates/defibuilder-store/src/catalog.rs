//! Reference examples and predefined prompts, keyed by contract type.
//!
//! The catalog is a single JSON document:
//!
//! ```json
//! {
//!   "references": { "Token": "pragma solidity 0.8.19; ..." },
//!   "prompts": [ { "template": "Token", "text": "Add a capped supply" } ]
//! }
//! ```
//!
//! A default catalog covering every [`ContractType`] is bundled with the crate.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use defibuilder_core::{ContractType, PromptTemplate, ReferenceExample};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::StoreError;

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");

/// Read-only source of reference examples and prompt templates.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// The single reference example for a contract type.
    async fn lookup(&self, contract_type: ContractType) -> Result<ReferenceExample, StoreError>;

    /// Predefined prompts, optionally restricted to one contract type.
    async fn prompt_templates(
        &self,
        contract_type: Option<ContractType>,
    ) -> Result<Vec<PromptTemplate>, StoreError>;
}

/// In-memory catalog loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    references: BTreeMap<ContractType, ReferenceExample>,
    #[serde(default)]
    prompts: Vec<PromptTemplate>,
}

impl Catalog {
    pub fn new(
        references: impl IntoIterator<Item = (ContractType, ReferenceExample)>,
        prompts: Vec<PromptTemplate>,
    ) -> Self {
        Self {
            references: references.into_iter().collect(),
            prompts,
        }
    }

    /// The catalog shipped with the crate.
    pub fn bundled() -> Result<Self, StoreError> {
        Ok(serde_json::from_str(BUNDLED_CATALOG)?)
    }

    /// Load a catalog file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::CatalogNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&text)?;
        info!(
            path = %path.display(),
            references = catalog.references.len(),
            prompts = catalog.prompts.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Contract types that have a reference example.
    pub fn contract_types(&self) -> impl Iterator<Item = ContractType> + '_ {
        self.references.keys().copied()
    }
}

#[async_trait]
impl ReferenceStore for Catalog {
    async fn lookup(&self, contract_type: ContractType) -> Result<ReferenceExample, StoreError> {
        self.references
            .get(&contract_type)
            .cloned()
            .ok_or(StoreError::MissingReference(contract_type))
    }

    async fn prompt_templates(
        &self,
        contract_type: Option<ContractType>,
    ) -> Result<Vec<PromptTemplate>, StoreError> {
        Ok(self
            .prompts
            .iter()
            .filter(|p| contract_type.is_none_or(|t| p.template == t))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bundled_catalog_covers_every_type() {
        let catalog = Catalog::bundled().unwrap();
        let types: Vec<ContractType> = catalog.contract_types().collect();
        assert_eq!(types, ContractType::ALL.to_vec());
    }

    #[tokio::test]
    async fn bundled_references_are_solidity() {
        let catalog = Catalog::bundled().unwrap();
        for t in ContractType::ALL {
            let example = catalog.lookup(t).await.unwrap();
            assert!(
                example.as_str().contains("pragma solidity"),
                "{t} reference has no pragma"
            );
        }
    }

    #[tokio::test]
    async fn prompts_filter_by_template() {
        let catalog = Catalog::bundled().unwrap();
        let all = catalog.prompt_templates(None).await.unwrap();
        let nft = catalog.prompt_templates(Some(ContractType::Nft)).await.unwrap();
        assert!(!nft.is_empty());
        assert!(nft.len() < all.len());
        assert!(nft.iter().all(|p| p.template == ContractType::Nft));
    }

    #[tokio::test]
    async fn missing_reference_errors() {
        let catalog = Catalog::new(
            [(ContractType::Token, ReferenceExample("contract T {}".into()))],
            vec![],
        );
        assert!(catalog.lookup(ContractType::Token).await.is_ok());
        assert!(matches!(
            catalog.lookup(ContractType::Exchange).await,
            Err(StoreError::MissingReference(ContractType::Exchange))
        ));
    }

    #[test]
    fn open_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"references": {{"Vault": "pragma solidity 0.8.19; contract V {{}}"}},
                "prompts": [{{"template": "Vault", "text": "Add a withdrawal fee"}}]}}"#
        )
        .unwrap();
        let catalog = Catalog::open(file.path()).unwrap();
        assert_eq!(catalog.contract_types().collect::<Vec<_>>(), vec![ContractType::Vault]);
    }

    #[test]
    fn open_missing_file_errors() {
        let result = Catalog::open(Path::new("/nonexistent/catalog.json"));
        assert!(matches!(result, Err(StoreError::CatalogNotFound(_))));
    }

    #[test]
    fn unknown_template_in_file_is_rejected() {
        let parsed = serde_json::from_str::<Catalog>(r#"{"references": {"Lottery": "x"}}"#);
        assert!(parsed.is_err());
    }
}
