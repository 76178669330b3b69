//! Per-column data type inference from the first rows under the header

use crate::types::column_letter;
use crate::workbook::{MemorySheet, SheetSource, ValueKind};
use std::collections::BTreeMap;

/// Columns examined per sheet
const MAX_COLUMNS: u32 = 19;
/// Column types recorded per sheet
const MAX_TYPES_PER_SHEET: usize = 15;
/// Data rows examined below the header
const SAMPLE_ROWS: u32 = 4;

/// Infer a type name for the leading columns of every sheet.
///
/// Keys are sheet-qualified (`Sheet1!B`). The header is row 1 when the
/// column has a value there, otherwise row 2. The first typed value among
/// the next rows decides; formula cells are typed by their cached value.
pub fn extract_column_types(sheets: &[MemorySheet]) -> BTreeMap<String, String> {
    let mut types = BTreeMap::new();

    for sheet in sheets {
        let mut recorded = 0;
        for column in 1..=sheet.column_count().min(MAX_COLUMNS) {
            let header_row = match sheet.cell(1, column) {
                Some(cell) if !cell.value.is_null() => 1,
                _ => 2,
            };

            let last = sheet.row_count().min(header_row + SAMPLE_ROWS);
            let kind = ((header_row + 1)..=last)
                .filter_map(|row| sheet.cell(row, column))
                .find_map(|cell| type_name(cell.kind));

            if let Some(kind) = kind {
                types.insert(
                    format!("{}!{}", sheet.name(), column_letter(column)),
                    kind.to_string(),
                );
                recorded += 1;
                if recorded >= MAX_TYPES_PER_SHEET {
                    break;
                }
            }
        }
    }

    types
}

/// Number formats are not available, so every number reads as `decimal`
fn type_name(kind: ValueKind) -> Option<&'static str> {
    match kind {
        ValueKind::Number => Some("decimal"),
        ValueKind::Date => Some("date"),
        ValueKind::DateTime => Some("datetime"),
        ValueKind::Text => Some("string"),
        ValueKind::Boolean => Some("boolean"),
        ValueKind::Error | ValueKind::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::SourceCell;
    use serde_json::json;

    #[test]
    fn test_types_from_first_data_rows() {
        let mut sheet = MemorySheet::new("Sales");
        sheet.set_value(1, 1, "Region");
        sheet.set_value(1, 2, "Amount");
        sheet.set_value(1, 3, "Closed");
        sheet.set_value(1, 4, "Paid");
        sheet.set_value(2, 1, "North");
        sheet.set_value(2, 2, 120.5);
        sheet.insert(2, 3, SourceCell::with_kind(json!("2024-03-01"), ValueKind::Date));
        sheet.set_value(2, 4, true);

        let types = extract_column_types(&[sheet]);
        assert_eq!(types["Sales!A"], "string");
        assert_eq!(types["Sales!B"], "decimal");
        assert_eq!(types["Sales!C"], "date");
        assert_eq!(types["Sales!D"], "boolean");
    }

    #[test]
    fn test_header_in_second_row() {
        let mut sheet = MemorySheet::new("Report");
        sheet.set_value(2, 1, "Amount");
        sheet.set_value(3, 1, 5);

        let types = extract_column_types(&[sheet]);
        assert_eq!(types["Report!A"], "decimal");
    }

    #[test]
    fn test_formula_cells_use_cached_value() {
        let mut sheet = MemorySheet::new("Calc");
        sheet.set_value(1, 1, "Total");
        sheet.set_formula(2, 1, "=1+1", json!(2));

        let types = extract_column_types(&[sheet]);
        assert_eq!(types["Calc!A"], "decimal");
    }

    #[test]
    fn test_columns_without_data_are_skipped() {
        let mut sheet = MemorySheet::new("Sparse");
        sheet.set_value(1, 1, "Only header");
        sheet.set_value(1, 2, "Other");
        sheet.set_value(2, 2, "x");

        let types = extract_column_types(&[sheet]);
        assert!(!types.contains_key("Sparse!A"));
        assert_eq!(types["Sparse!B"], "string");
    }
}
