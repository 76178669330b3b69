//! Repeated formula patterns, implementation notes and calculated-value
//! samples for the enriched context

use crate::sampling::normalize_formula;
use crate::types::{CellValue, SheetDocument};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Patterns reported per workbook
pub const MAX_PATTERNS: usize = 10;
/// Calculated values sampled per workbook
pub const MAX_SAMPLES: usize = 10;

const STRUCTURED_REFERENCES_NOTE: &str = "Table[[#This Row],[Column]] refers to the value in the current row of the specified column in the Excel table";
const PIVOT_TABLES_NOTE: &str = "Pivot tables provide summarized views of data. In a web implementation, these can be created dynamically from the raw data.";

fn this_row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Za-z0-9_]+)\[\[#This Row\],\[([^\]]+)\]\]")
            .expect("this-row reference regex must compile")
    })
}

/// Formula shapes used more than once, most frequent first.
///
/// Ties keep the order in which the shapes first appear (sheet, then
/// row-major). Named `pattern_01`, `pattern_02`, ... so that key order
/// is rank order.
pub fn extract_formula_patterns(sheets: &BTreeMap<String, SheetDocument>) -> BTreeMap<String, String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for sheet in sheets.values() {
        for (_, formula) in sheet.formulas() {
            let signature = normalize_formula(formula);
            let count = counts.entry(signature.clone()).or_insert(0);
            if *count == 0 {
                order.push(signature);
            }
            *count += 1;
        }
    }

    let mut repeated: Vec<(usize, &String)> = order
        .iter()
        .enumerate()
        .filter(|(_, signature)| counts[*signature] > 1)
        .collect();
    // Stable sort keeps first-seen order among equal counts
    repeated.sort_by(|(_, a), (_, b)| counts[*b].cmp(&counts[*a]));

    repeated
        .into_iter()
        .take(MAX_PATTERNS)
        .enumerate()
        .map(|(i, (_, signature))| (format!("pattern_{:02}", i + 1), signature.clone()))
        .collect()
}

/// Notes for someone reimplementing the workbook's logic
pub fn implementation_notes(patterns: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut notes = BTreeMap::new();
    notes.insert(
        "structured_references".to_string(),
        STRUCTURED_REFERENCES_NOTE.to_string(),
    );

    let first = patterns.values().next();
    if let Some(pattern) = first {
        notes.insert("js_equivalent".to_string(), js_equivalent(pattern));
    }

    notes.insert("pivot_tables".to_string(), PIVOT_TABLES_NOTE.to_string());
    notes
}

/// Rough JavaScript rendering of a formula built on `[#This Row]` references
pub fn js_equivalent(formula: &str) -> String {
    if !formula.contains("[[#This Row],[") {
        return "row => /* Formula requires custom implementation */".to_string();
    }
    if !this_row_re().is_match(formula) {
        return "row => /* Formula could not be automatically converted */".to_string();
    }

    let expression = this_row_re().replace_all(formula, "row['$2']");
    let expression = expression
        .replace('=', "")
        .replace("<>", "!==")
        .replace('&', "+");
    format!("row => {}", expression)
}

/// Up to [`MAX_SAMPLES`] cached results of formula cells, keyed `Sheet!A1`
pub fn extract_samples(sheets: &BTreeMap<String, SheetDocument>) -> BTreeMap<String, Value> {
    let mut samples = BTreeMap::new();

    'sheets: for (name, sheet) in sheets {
        for (address, cell) in &sheet.cells {
            let CellValue::Formula(formula) = &cell.value else {
                continue;
            };
            if formula.calculated_value.is_null() {
                continue;
            }
            samples.insert(
                format!("{}!{}", name, address),
                formula.calculated_value.clone(),
            );
            if samples.len() >= MAX_SAMPLES {
                break 'sheets;
            }
        }
    }

    samples
}
