//! Typed view over the Solidity JSON ABI.
//!
//! Only the fields callers need (entry kind, names, parameter types) are
//! modelled; unknown extra fields are ignored but a missing or mistyped
//! required field is a parse error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

/// One input/output parameter of an ABI entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
}

impl AbiParam {
    /// Canonical type with tuples expanded, e.g. `(address,uint256)[]` for a
    /// `tuple[]` parameter.
    pub fn canonical_type(&self) -> String {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) => format!("({}){suffix}", canonical_list(&self.components)),
            None => self.kind.clone(),
        }
    }
}

fn canonical_list(params: &[AbiParam]) -> String {
    params
        .iter()
        .map(AbiParam::canonical_type)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AbiEntry {
    #[serde(rename_all = "camelCase")]
    Function {
        name: String,
        #[serde(default)]
        inputs: Vec<AbiParam>,
        #[serde(default)]
        outputs: Vec<AbiParam>,
        state_mutability: Option<StateMutability>,
    },
    #[serde(rename_all = "camelCase")]
    Constructor {
        #[serde(default)]
        inputs: Vec<AbiParam>,
        state_mutability: Option<StateMutability>,
    },
    Event {
        name: String,
        #[serde(default)]
        inputs: Vec<AbiParam>,
        #[serde(default)]
        anonymous: bool,
    },
    Error {
        name: String,
        #[serde(default)]
        inputs: Vec<AbiParam>,
    },
    #[serde(rename_all = "camelCase")]
    Fallback {
        state_mutability: Option<StateMutability>,
    },
    #[serde(rename_all = "camelCase")]
    Receive {
        state_mutability: Option<StateMutability>,
    },
}

impl AbiEntry {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Function { name, .. } | Self::Event { name, .. } | Self::Error { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }

    /// Human-readable signature prefixed with the entry kind, e.g.
    /// `function mint(address,uint256)`.
    pub fn signature(&self) -> String {
        match self {
            Self::Function { name, inputs, .. } => format!("function {name}({})", canonical_list(inputs)),
            Self::Constructor { inputs, .. } => format!("constructor({})", canonical_list(inputs)),
            Self::Event { name, inputs, .. } => format!("event {name}({})", canonical_list(inputs)),
            Self::Error { name, inputs } => format!("error {name}({})", canonical_list(inputs)),
            Self::Fallback { .. } => "fallback()".to_string(),
            Self::Receive { .. } => "receive()".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_function_with_mutability() {
        let entry: AbiEntry = serde_json::from_value(json!({
            "type": "function",
            "name": "balanceOf",
            "stateMutability": "view",
            "inputs": [{"name": "account", "type": "address", "internalType": "address"}],
            "outputs": [{"name": "", "type": "uint256"}]
        }))
        .unwrap();
        assert_eq!(entry.name(), Some("balanceOf"));
        assert_eq!(entry.signature(), "function balanceOf(address)");
        match entry {
            AbiEntry::Function {
                state_mutability, ..
            } => assert_eq!(state_mutability, Some(StateMutability::View)),
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_receive_and_fallback() {
        let receive: AbiEntry =
            serde_json::from_value(json!({"type": "receive", "stateMutability": "payable"})).unwrap();
        assert_eq!(receive.signature(), "receive()");
        let fallback: AbiEntry = serde_json::from_value(json!({"type": "fallback"})).unwrap();
        assert_eq!(fallback.name(), None);
    }

    #[test]
    fn tuple_components_are_kept() {
        let entry: AbiEntry = serde_json::from_value(json!({
            "type": "error",
            "name": "BadOrder",
            "inputs": [{
                "name": "order",
                "type": "tuple",
                "components": [{"name": "maker", "type": "address"}, {"name": "price", "type": "uint256"}]
            }]
        }))
        .unwrap();
        let AbiEntry::Error { inputs, .. } = entry else {
            panic!("expected error entry");
        };
        assert_eq!(inputs[0].components.len(), 2);
        assert_eq!(inputs[0].canonical_type(), "(address,uint256)");
    }

    #[test]
    fn tuple_arrays_render_components_in_signature() {
        let entry: AbiEntry = serde_json::from_value(json!({
            "type": "function",
            "name": "fill",
            "inputs": [
                {
                    "name": "orders",
                    "type": "tuple[]",
                    "components": [
                        {"name": "maker", "type": "address"},
                        {"name": "legs", "type": "tuple[2]", "components": [{"name": "amount", "type": "uint128"}]}
                    ]
                },
                {"name": "deadline", "type": "uint64"}
            ]
        }))
        .unwrap();
        assert_eq!(
            entry.signature(),
            "function fill((address,(uint128)[2])[],uint64)"
        );
    }

    #[test]
    fn unknown_entry_type_rejected() {
        let parsed = serde_json::from_value::<AbiEntry>(json!({"type": "modifier", "name": "onlyOwner"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_mutability_rejected() {
        let parsed = serde_json::from_value::<AbiEntry>(json!({
            "type": "function",
            "name": "f",
            "stateMutability": "constant"
        }));
        assert!(parsed.is_err());
    }
}
