//! Data validation rules and pivot tables for the enriched context

use crate::types::CellAddress;
use crate::workbook::{MemorySheet, SheetSource, ValidationRule};
use serde_json::Value;
use std::collections::BTreeMap;

/// Rows scanned for validated cells
const SCAN_ROWS: u32 = 100;
/// Columns scanned for validated cells
const SCAN_COLUMNS: u32 = 20;
/// Distinct rules recorded per sheet
pub const MAX_RULES_PER_SHEET: usize = 10;

/// Distinct validation rules per sheet, each anchored at the first cell of
/// the top-left `100x20` block it covers.
///
/// Rules with the same type, operator and first formula count once. Sheets
/// without any matching cell are left out.
pub fn extract_validation(sheets: &[MemorySheet]) -> BTreeMap<String, Vec<Value>> {
    let mut validation = BTreeMap::new();

    for sheet in sheets {
        if sheet.validations().is_empty() {
            continue;
        }

        let mut seen: Vec<&ValidationRule> = Vec::new();
        let mut rules = Vec::new();

        'scan: for row in 1..=sheet.row_count().min(SCAN_ROWS) {
            for column in 1..=sheet.column_count().min(SCAN_COLUMNS) {
                let Some(rule) = sheet.validations().iter().find(|r| r.covers(row, column)) else {
                    continue;
                };
                if seen.iter().any(|s| s.identity() == rule.identity()) {
                    continue;
                }
                seen.push(rule);
                rules.push(rule.to_context_json(&CellAddress::new(row, column).to_string()));
                if rules.len() >= MAX_RULES_PER_SHEET {
                    break 'scan;
                }
            }
        }

        if !rules.is_empty() {
            validation.insert(sheet.name().to_string(), rules);
        }
    }

    validation
}

/// Pivot tables per sheet; sheets without one are left out
pub fn extract_pivot_tables(sheets: &[MemorySheet]) -> BTreeMap<String, Vec<Value>> {
    sheets
        .iter()
        .filter(|sheet| !sheet.pivot_tables().is_empty())
        .map(|sheet| {
            let pivots = sheet.pivot_tables().iter().map(|p| p.to_json()).collect();
            (sheet.name().to_string(), pivots)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{CellRange, PivotDataField, PivotTableInfo};
    use serde_json::json;

    fn rule(kind: &str, formula1: &str, sqref: &str) -> ValidationRule {
        ValidationRule {
            ranges: vec![CellRange::parse(sqref).unwrap()],
            kind: kind.to_string(),
            formula1: formula1.to_string(),
            ..Default::default()
        }
    }

    fn sheet_with(rules: Vec<ValidationRule>) -> MemorySheet {
        let mut sheet = MemorySheet::new("Tasks");
        sheet.set_value(1, 1, "Status");
        sheet.set_value(200, 30, "far corner");
        sheet.set_validations(rules);
        sheet
    }

    #[test]
    fn test_rules_anchor_at_first_covered_cell() {
        let sheet = sheet_with(vec![
            rule("list", "\"Open,Closed\"", "B2:B50"),
            rule("decimal", "0", "D5:D9"),
        ]);

        let validation = extract_validation(&[sheet]);
        let rules = &validation["Tasks"];
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0]["cell"], "B2");
        assert_eq!(rules[0]["values"], json!(["Open", "Closed"]));
        assert_eq!(rules[1]["cell"], "D5");
        assert_eq!(rules[1]["type"], "decimal");
    }

    #[test]
    fn test_identical_rules_count_once() {
        let sheet = sheet_with(vec![
            rule("list", "Statuses", "A2:A10"),
            rule("list", "Statuses", "C2:C10"),
        ]);

        let validation = extract_validation(&[sheet]);
        assert_eq!(validation["Tasks"].len(), 1);
        assert_eq!(validation["Tasks"][0]["cell"], "A2");
    }

    #[test]
    fn test_rules_outside_scan_window_are_ignored() {
        let sheet = sheet_with(vec![rule("whole", "1", "A150"), rule("whole", "2", "Z5")]);
        assert!(extract_validation(&[sheet]).is_empty());
    }

    #[test]
    fn test_rule_cap_per_sheet() {
        let rules = (1..=12)
            .map(|i| rule("whole", &i.to_string(), &format!("A{}", i + 1)))
            .collect();
        let validation = extract_validation(&[sheet_with(rules)]);
        assert_eq!(validation["Tasks"].len(), MAX_RULES_PER_SHEET);
    }

    #[test]
    fn test_pivot_tables_by_sheet() {
        let mut report = MemorySheet::new("Report");
        report.set_pivot_tables(vec![PivotTableInfo {
            name: "ByRegion".to_string(),
            location: Some("A3:B8".to_string()),
            row_fields: vec!["Region".to_string()],
            data_fields: vec![PivotDataField {
                name: "Sum of Amount".to_string(),
                function: "sum".to_string(),
            }],
            ..Default::default()
        }]);
        let plain = MemorySheet::new("Data");

        let pivots = extract_pivot_tables(&[plain, report]);
        assert_eq!(pivots.len(), 1);
        assert_eq!(pivots["Report"][0]["name"], "ByRegion");
        assert_eq!(
            pivots["Report"][0]["fields"]["data_fields"],
            json!([{"name": "Sum of Amount", "function": "sum"}])
        );
    }
}
