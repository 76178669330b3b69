//! JSON Schema check for converted workbook documents

use crate::error::{DigestError, DigestResult};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::path::Path;

/// Validate a decoded (canonical-key) workbook document against the embedded
/// schema
pub fn validate_workbook_document(path: &Path, document: &Value) -> DigestResult<()> {
    let schema_str = include_str!("../../schema/workbook-document.schema.json");
    let schema_value: Value = serde_json::from_str(schema_str)
        .map_err(|e| DigestError::Config(format!("Failed to parse schema: {}", e)))?;

    let compiled_schema = JSONSchema::compile(&schema_value)
        .map_err(|e| DigestError::Config(format!("Failed to compile schema: {}", e)))?;

    if let Err(errors) = compiled_schema.validate(document) {
        let error_messages: Vec<String> = errors.map(|e| format!("  - {}", e)).collect();
        return Err(DigestError::Document {
            path: path.to_path_buf(),
            reason: format!("schema validation failed:\n{}", error_messages.join("\n")),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_document_passes() {
        let doc = json!({
            "file_name": "Budget.xlsx",
            "sheets": {
                "Sheet1": {
                    "metadata": {"title": "Sheet1", "dimensions": "A1:B2", "max_row": 2, "max_column": 2},
                    "cells": {
                        "A1": {"value": "Header"},
                        "B2": {"value": {"formula": "=A2*2", "calculated_value": null}}
                    }
                }
            }
        });
        assert!(validate_workbook_document(Path::new("budget.json"), &doc).is_ok());
    }

    #[test]
    fn test_missing_sheets_fails() {
        let doc = json!({"file_name": "Budget.xlsx"});
        let err = validate_workbook_document(Path::new("budget.json"), &doc).unwrap_err();
        assert!(matches!(err, DigestError::Document { .. }));
    }

    #[test]
    fn test_bad_cell_address_fails() {
        let doc = json!({
            "sheets": {"Sheet1": {"cells": {"not-a-cell": {"value": 1}}}}
        });
        assert!(validate_workbook_document(Path::new("x.json"), &doc).is_err());
    }
}
