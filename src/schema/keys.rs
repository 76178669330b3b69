//! Property-name abbreviation for token-efficient output
//!
//! Documents are built with canonical (verbose) property names and encoded
//! on the way out. Keys of data-keyed maps (sheet names, cell addresses,
//! table names, workbook IDs, ...) are never renamed; only property keys are.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which property names a document is written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Short aliases (`formula` → `f`)
    #[default]
    Abbreviated,
    /// Canonical property names
    Full,
}

impl KeyMode {
    pub fn from_full_names(full_names: bool) -> Self {
        if full_names {
            KeyMode::Full
        } else {
            KeyMode::Abbreviated
        }
    }

    pub fn is_abbreviated(self) -> bool {
        self == KeyMode::Abbreviated
    }
}

/// Canonical property name → alias.
///
/// `mc` and `sp` are each shared by two properties. The aliases are kept as
/// published so existing consolidated files stay readable; decoding tells
/// them apart by the enclosing property (see [`canonical_key`]).
pub const PROPERTY_MAP: &[(&str, &str)] = &[
    ("value", "v"),
    ("formula", "f"),
    ("calculated_value", "cv"),
    ("style", "s"),
    ("data_validation", "dv"),
    ("hyperlink", "h"),
    ("comment", "c"),
    ("dependencies", "d"),
    ("metadata", "m"),
    ("cells", "cl"),
    ("merged_cells", "mc"),
    ("conditional_formatting", "cf"),
    ("protection", "p"),
    ("view_settings", "vs"),
    ("pivot_tables", "pt"),
    ("charts", "ch"),
    ("form_controls", "fc"),
    ("auto_filter", "af"),
    ("sheets", "sh"),
    ("file_name", "fn"),
    ("named_ranges", "nr"),
    ("title", "t"),
    ("dimensions", "dim"),
    ("max_row", "mr"),
    ("max_column", "mc"),
    ("sheet_properties", "sp"),
    ("token_count", "tc"),
    ("conversion_timestamp", "ts"),
    ("original_filename", "of"),
    ("tables", "tb"),
    ("samples", "sp"),
    ("column_types", "ct"),
    ("formula_patterns", "fp"),
    ("implementation_notes", "in"),
    ("range", "rg"),
    ("columns", "cols"),
    ("header_row", "hr"),
    ("js_equivalent", "js"),
    ("structured_references", "sr"),
    ("enriched_context", "ec"),
    ("cell_references", "cr"),
    ("validation", "val"),
    ("workbooks", "wb"),
    ("cross_references", "xr"),
    ("workbook_count", "wc"),
    ("key_mode", "km"),
];

/// Properties whose object value is keyed by data rather than by property
/// names.
const DATA_KEYED: &[&str] = &[
    "sheets",
    "cells",
    "named_ranges",
    "tables",
    "column_types",
    "formula_patterns",
    "samples",
    "validation",
    "pivot_tables",
    "workbooks",
    "cross_references",
];

/// Alias for a canonical property name
pub fn alias(canonical: &str) -> Option<&'static str> {
    PROPERTY_MAP
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, short)| *short)
}

/// Property name to write for `canonical` under `mode`
pub fn map_key(canonical: &str, mode: KeyMode) -> String {
    match mode {
        KeyMode::Abbreviated => alias(canonical).unwrap_or(canonical).to_string(),
        KeyMode::Full => canonical.to_string(),
    }
}

/// Canonical property name for `key`, read inside the property `parent`.
///
/// Unknown keys (including canonical names) come back unchanged.
pub fn canonical_key(key: &str, parent: Option<&str>) -> String {
    match (key, parent) {
        ("mc", Some("metadata")) => return "max_column".to_string(),
        ("mc", _) => return "merged_cells".to_string(),
        ("sp", Some("enriched_context")) => return "samples".to_string(),
        ("sp", _) => return "sheet_properties".to_string(),
        _ => {}
    }
    PROPERTY_MAP
        .iter()
        .find(|(_, short)| *short == key)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| key.to_string())
}

fn is_data_keyed(canonical: &str) -> bool {
    DATA_KEYED.contains(&canonical)
}

/// Encode a canonical document tree with the property names of `mode`
pub fn encode(value: Value, mode: KeyMode) -> Value {
    if mode == KeyMode::Full {
        return value;
    }
    encode_node(value, mode, false)
}

fn encode_node(value: Value, mode: KeyMode, data_keyed: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                if data_keyed {
                    out.insert(key, encode_node(child, mode, false));
                } else {
                    let child_keyed = is_data_keyed(&key);
                    out.insert(map_key(&key, mode), encode_node(child, mode, child_keyed));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| encode_node(item, mode, false))
                .collect(),
        ),
        other => other,
    }
}

/// Decode an abbreviated document tree back to canonical property names
pub fn decode(value: Value) -> Value {
    decode_node(value, false, None)
}

fn decode_node(value: Value, data_keyed: bool, parent: Option<&str>) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                if data_keyed {
                    out.insert(key, decode_node(child, false, None));
                } else {
                    let canonical = canonical_key(&key, parent);
                    let child_keyed = is_data_keyed(&canonical);
                    let decoded = decode_node(child, child_keyed, Some(&canonical));
                    out.insert(canonical, decoded);
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| decode_node(item, false, parent))
                .collect(),
        ),
        other => other,
    }
}

/// Work out which key mode produced a document.
///
/// The `key_mode` metadata entry wins; older files without it are recognised
/// by their top-level keys.
pub fn detect_mode(document: &Value) -> KeyMode {
    let declared = ["m", "metadata"]
        .iter()
        .filter_map(|k| document.get(*k))
        .flat_map(|meta| ["km", "key_mode"].into_iter().filter_map(move |k| meta.get(k)))
        .find_map(|mode| serde_json::from_value::<KeyMode>(mode.clone()).ok());
    if let Some(mode) = declared {
        return mode;
    }

    let abbreviated = ["sh", "fn", "wb", "xr", "ec"]
        .iter()
        .any(|k| document.get(*k).is_some());
    if abbreviated {
        KeyMode::Abbreviated
    } else {
        KeyMode::Full
    }
}
