//! Vulnerability findings and strict validation of auditor output.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        })
    }
}

/// One audit finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AuditPayload {
    Wrapped { audits: Vec<Vulnerability> },
    Bare(Vec<Vulnerability>),
}

/// Validate raw auditor output against the finding schema.
///
/// Accepts `{"audits": [...]}` or a bare array. Every finding needs a
/// non-empty title and description and a severity of exactly `High`,
/// `Medium`, or `Low`. Nothing is coerced: any deviation is a
/// [`PipelineError::SchemaValidation`].
pub fn parse_findings(raw: &str) -> Result<Vec<Vulnerability>, PipelineError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| PipelineError::SchemaValidation(format!("audit response is not JSON: {e}")))?;

    let findings = match serde_json::from_value::<AuditPayload>(value.clone()) {
        Ok(AuditPayload::Wrapped { audits }) | Ok(AuditPayload::Bare(audits)) => audits,
        Err(_) => return Err(PipelineError::SchemaValidation(describe_mismatch(&value))),
    };

    for (i, finding) in findings.iter().enumerate() {
        if finding.title.trim().is_empty() {
            return Err(PipelineError::SchemaValidation(format!(
                "finding {i}: title is empty"
            )));
        }
        if finding.description.trim().is_empty() {
            return Err(PipelineError::SchemaValidation(format!(
                "finding {i}: description is empty"
            )));
        }
    }

    Ok(findings)
}

/// Name the first offending finding; the untagged payload error only says
/// that no variant matched.
fn describe_mismatch(value: &serde_json::Value) -> String {
    let list = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => match map.get("audits") {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => return "`audits` is not an array".to_string(),
            None => return "expected an object with an `audits` array".to_string(),
        },
        _ => return "expected an array of findings".to_string(),
    };

    for (i, item) in list.iter().enumerate() {
        if let Err(e) = serde_json::from_value::<Vulnerability>(item.clone()) {
            return format!("finding {i}: {e}");
        }
    }
    "findings do not match the schema".to_string()
}
