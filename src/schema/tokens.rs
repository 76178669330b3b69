//! Approximate LLM token counting for serialized documents
//!
//! This is a cheap heuristic modelled on sub-word tokenizers, not a real
//! tokenizer. Counts are estimates with no exactness guarantee; they drive
//! output file names and size feedback only.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

struct TokenPatterns {
    structural: Regex,
    camel: Regex,
    pascal: Regex,
    digits: Regex,
    other: Regex,
}

fn patterns() -> &'static TokenPatterns {
    static PATTERNS: OnceLock<TokenPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TokenPatterns {
        structural: Regex::new(r"([\{\}\[\],:])").expect("valid regex"),
        camel: Regex::new(r"([a-z])([A-Z])").expect("valid regex"),
        pascal: Regex::new(r"([A-Z])([A-Z][a-z])").expect("valid regex"),
        digits: Regex::new(r"([0-9]+)").expect("valid regex"),
        other: Regex::new(r"([^a-zA-Z0-9\s\{\}\[\],:])").expect("valid regex"),
    })
}

/// Estimate the token cost of a JSON document
pub fn estimate_tokens(document: &Value) -> usize {
    match serde_json::to_string(document) {
        Ok(json) => estimate_text_tokens(&json),
        Err(e) => {
            tracing::warn!("Could not serialize document for token counting: {}", e);
            0
        }
    }
}

/// Estimate the token cost of serialized JSON text
pub fn estimate_text_tokens(json: &str) -> usize {
    let TokenPatterns {
        structural,
        camel,
        pascal,
        digits,
        other,
    } = patterns();

    // Structural characters become their own tokens
    let text = structural.replace_all(json, " $1 ");

    // camelCase and PascalCase boundaries
    let text = camel.replace_all(&text, "$1 $2");
    let text = pascal.replace_all(&text, "$1 $2");

    let text = digits.replace_all(&text, " $1 ");
    let text = other.replace_all(&text, " $1 ");

    let tokens = text.split_whitespace().count();
    let structural_chars = text
        .chars()
        .filter(|c| matches!(c, '{' | '}' | '[' | ']' | ',' | ':'))
        .count();

    // Half a token of overhead per structural character
    (tokens as f64 + structural_chars as f64 * 0.5).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_object() {
        // "{}" → 2 tokens + 2 * 0.5 overhead
        assert_eq!(estimate_text_tokens("{}"), 3);
    }

    #[test]
    fn test_simple_pair() {
        // { "a" : 1 } → {, ", a, ", :, 1, } = 7 tokens, 3 structural → 8.5 → 8
        assert_eq!(estimate_text_tokens(r#"{"a":1}"#), 8);
    }

    #[test]
    fn test_camel_case_splits() {
        let camel = estimate_text_tokens("maxRowCount");
        let flat = estimate_text_tokens("maxrowcount");
        assert_eq!(flat, 1);
        assert_eq!(camel, 3);
    }

    #[test]
    fn test_pascal_acronym_boundary() {
        // "HTMLParser" → "HTML Parser"
        assert_eq!(estimate_text_tokens("HTMLParser"), 2);
    }

    #[test]
    fn test_digits_are_separate_tokens() {
        assert_eq!(estimate_text_tokens("B12"), 2);
        assert_eq!(estimate_text_tokens("sheet 2024"), 2);
    }

    #[test]
    fn test_document_estimate_grows_with_content() {
        let small = estimate_tokens(&json!({"sh": {}}));
        let large = estimate_tokens(&json!({
            "sh": {"Sheet1": {"cl": {"A1": {"v": "Revenue"}, "B1": {"v": 1200}}}}
        }));
        assert!(small > 0);
        assert!(large > small);
    }

    #[test]
    fn test_abbreviated_keys_are_cheaper() {
        let full = estimate_tokens(&json!({"calculated_value": 1, "conversion_timestamp": "x"}));
        let short = estimate_tokens(&json!({"cv": 1, "ts": "x"}));
        assert!(short < full);
    }
}
