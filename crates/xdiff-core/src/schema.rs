//! OpenAPI/CRD schema validation (§4.6: "the calculator validates each
//! input XR against the XRD's OpenAPI schema ... and each desired composed
//! resource against its CRD schema").
//!
//! Grounded in the teacher's `SchemaValidator`, trimmed to the single
//! JSON-Schema path Kubernetes CRDs actually use — Crossplane has no
//! equivalent of the teacher's simplified schema dialect.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

/// The outcome of validating one document against one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Extract the `openAPIV3Schema` for one served version out of a CRD or XRD
/// document's `spec.versions[]` list. Shared by the XRD's own
/// `schema_for_version` and by CRD-schema lookups for composed resources
/// (§4.6: "each desired composed resource against its CRD schema"), since
/// both document kinds carry the schema at the same path.
pub fn schema_for_version<'a>(document: &'a JsonValue, version: &str) -> Option<&'a JsonValue> {
    document
        .get("spec")?
        .get("versions")?
        .as_array()?
        .iter()
        .find(|v| v.get("name").and_then(JsonValue::as_str) == Some(version))?
        .get("schema")?
        .get("openAPIV3Schema")
}

/// A compiled `openAPIV3Schema`, ready to validate candidate documents.
pub struct SchemaValidator {
    compiled: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn compile(schema: &JsonValue) -> Result<Self> {
        let compiled = jsonschema::validator_for(schema).map_err(|e| CoreError::InvalidSchema {
            message: e.to_string(),
        })?;
        Ok(Self { compiled })
    }

    pub fn validate(&self, document: &JsonValue) -> ValidationResult {
        if self.compiled.is_valid(document) {
            return ValidationResult::default();
        }
        let issues = self
            .compiled
            .iter_errors(document)
            .map(|e| {
                let path = e.instance_path.to_string();
                ValidationIssue {
                    path: if path.is_empty() { "(root)".to_string() } else { path },
                    message: e.to_string().replace('"', "'"),
                }
            })
            .collect();
        ValidationResult { issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_document_has_no_issues() {
        let schema = json!({
            "type": "object",
            "properties": { "size": { "type": "string" } },
            "required": ["size"],
        });
        let validator = SchemaValidator::compile(&schema).unwrap();
        let result = validator.validate(&json!({ "size": "large" }));
        assert!(result.is_valid());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let schema = json!({
            "type": "object",
            "properties": { "size": { "type": "string" } },
            "required": ["size"],
        });
        let validator = SchemaValidator::compile(&schema).unwrap();
        let result = validator.validate(&json!({}));
        assert!(!result.is_valid());
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn invalid_schema_is_rejected_at_compile_time() {
        let schema = json!({ "type": "not-a-real-type" });
        assert!(SchemaValidator::compile(&schema).is_err());
    }
}
