//! Single-workbook conversion: spreadsheet → [`WorkbookDocument`]

mod output;

pub use output::{
    output_file_name, timestamp, write_json, write_workbook_json, OutputOptions, WrittenDocument,
};

use crate::analysis::{
    extract_column_types, extract_dependencies, extract_formula_patterns, extract_pivot_tables,
    extract_samples, extract_tables, extract_validation, implementation_notes, local_cells,
};
use crate::error::{DigestError, DigestResult};
use crate::sampling::{sample, SampledRowSet, SamplingOptions};
use crate::types::{
    CellAddress, CellRecord, CellValue, EnrichedContext, FormulaValue, SheetDocument,
    SheetMetadata, WorkbookDocument,
};
use crate::workbook::{MemorySheet, SheetSource, SourceCell, TableDefinition, WorkbookReader};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Sheets with at most this many rows are never sampled
pub const SAMPLING_THRESHOLD: u32 = 50;

/// Data cells kept per sheet in formulas-only mode, besides formulas and
/// the cells they reference
pub const FORMULAS_ONLY_DATA_CELLS: usize = 100;

/// Per-conversion settings
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Rows read per sheet when not sampling (`None` = all)
    pub row_limit: Option<u32>,
    pub formulas_only: bool,
    pub keep_formatting: bool,
    pub include_context: bool,
    /// Formula-preserving sampling; `None` disables it
    pub sampling: Option<SamplingOptions>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            row_limit: None,
            formulas_only: false,
            keep_formatting: false,
            include_context: true,
            sampling: None,
        }
    }
}

/// Convert one spreadsheet file.
///
/// Unreadable sheets are skipped with a warning; a workbook that yields no
/// sheet at all is an error.
pub fn convert_workbook(path: &Path, options: &ConvertOptions) -> DigestResult<WorkbookDocument> {
    tracing::info!(file = %path.display(), "Converting workbook");

    let mut reader = WorkbookReader::open(path)?;
    if options.keep_formatting && !reader.capabilities().any() {
        tracing::warn!(
            file = %path.display(),
            "Validations, hyperlinks and comments are not available for this file; writing values only"
        );
    }

    let sheets = reader.read_sheets();
    if sheets.is_empty() {
        return Err(DigestError::NoSheets(path.to_path_buf()));
    }

    let named_ranges = reader.named_ranges();
    let defined_names: BTreeSet<String> = named_ranges.keys().cloned().collect();

    let mut document = WorkbookDocument::new(reader.file_name());
    for sheet in &sheets {
        tracing::debug!(sheet = sheet.name(), "Processing sheet");
        let rows = select_sheet_rows(sheet, options);
        document.sheets.insert(
            sheet.name().to_string(),
            convert_sheet(sheet, &rows, &defined_names, options),
        );
    }
    document.named_ranges = named_ranges;

    if options.include_context {
        let declared = reader.tables();
        document.enriched_context = Some(build_context(&document.sheets, &sheets, &declared));
    }

    Ok(document)
}

/// Rows to emit for one sheet
pub fn select_sheet_rows(sheet: &dyn SheetSource, options: &ConvertOptions) -> SampledRowSet {
    match &options.sampling {
        Some(sampling) if sheet.row_count() > SAMPLING_THRESHOLD => sample(sheet, sampling),
        _ => SampledRowSet::leading(sheet.row_count(), options.row_limit),
    }
}

/// Emit the non-empty cells of the selected rows
pub fn convert_sheet(
    sheet: &MemorySheet,
    rows: &SampledRowSet,
    defined_names: &BTreeSet<String>,
    options: &ConvertOptions,
) -> SheetDocument {
    let referenced = if options.formulas_only {
        referenced_cells(sheet, rows)
    } else {
        HashSet::new()
    };

    let mut cells = BTreeMap::new();
    let mut data_cells = 0;

    for row in rows.iter() {
        for (column, cell) in sheet.row_cells(row) {
            if cell.is_empty() {
                continue;
            }
            let address = CellAddress::new(row, column);

            if options.formulas_only && !cell.has_formula() && !referenced.contains(&address) {
                if data_cells >= FORMULAS_ONLY_DATA_CELLS {
                    continue;
                }
                data_cells += 1;
            }

            cells.insert(address, cell_record(cell, defined_names, options.keep_formatting));
        }
    }

    SheetDocument {
        metadata: SheetMetadata {
            title: sheet.name().to_string(),
            dimensions: sheet.dimensions(),
            max_row: sheet.row_count(),
            max_column: sheet.column_count(),
        },
        cells,
    }
}

/// Same-sheet cells referenced by formulas in the selected rows
fn referenced_cells(sheet: &MemorySheet, rows: &SampledRowSet) -> HashSet<CellAddress> {
    rows.iter()
        .flat_map(|row| sheet.row_cells(row))
        .filter_map(|(_, cell)| cell.formula.as_deref())
        .flat_map(local_cells)
        .collect()
}

fn cell_record(cell: &SourceCell, defined_names: &BTreeSet<String>, keep_formatting: bool) -> CellRecord {
    let mut record = match &cell.formula {
        Some(formula) => {
            let mut record = CellRecord::new(CellValue::Formula(FormulaValue {
                formula: formula.clone(),
                calculated_value: cell.value.clone(),
            }));
            let deps = extract_dependencies(formula, defined_names);
            if !deps.is_empty() {
                record.dependencies = Some(deps);
            }
            record
        }
        None => CellRecord::new(CellValue::Scalar(cell.value.clone())),
    };

    if keep_formatting {
        record.data_validation = cell.data_validation.clone();
        record.hyperlink = cell.hyperlink.clone();
        record.comment = cell.comment.clone();
    }

    record
}

fn build_context(
    documents: &BTreeMap<String, SheetDocument>,
    sheets: &[MemorySheet],
    declared: &[TableDefinition],
) -> EnrichedContext {
    let formula_patterns = extract_formula_patterns(documents);
    EnrichedContext {
        tables: extract_tables(declared, sheets),
        column_types: extract_column_types(sheets),
        implementation_notes: implementation_notes(&formula_patterns),
        samples: extract_samples(documents),
        formula_patterns,
        validation: extract_validation(sheets),
        pivot_tables: extract_pivot_tables(sheets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger(rows: u32) -> MemorySheet {
        let mut sheet = MemorySheet::new("Ledger");
        sheet.set_value(1, 1, "Qty");
        sheet.set_value(1, 2, "Price");
        sheet.set_value(1, 3, "Total");
        for row in 2..=rows {
            sheet.set_value(row, 1, row);
            sheet.set_value(row, 2, 2);
            sheet.set_formula(row, 3, &format!("=A{}*B{}", row, row), json!(row * 2));
        }
        sheet
    }

    #[test]
    fn test_small_sheets_are_not_sampled() {
        let options = ConvertOptions {
            sampling: Some(SamplingOptions::default()),
            ..Default::default()
        };
        let rows = select_sheet_rows(&ledger(50), &options);
        assert_eq!(rows.len(), 50);
    }

    #[test]
    fn test_large_sheets_are_sampled() {
        let options = ConvertOptions {
            sampling: Some(SamplingOptions::default()),
            ..Default::default()
        };
        let rows = select_sheet_rows(&ledger(400), &options);
        assert!(rows.len() < 400);
        assert!(rows.contains(2));
        assert!(rows.contains(400));
    }

    #[test]
    fn test_row_limit_without_sampling() {
        let options = ConvertOptions {
            row_limit: Some(10),
            ..Default::default()
        };
        let rows = select_sheet_rows(&ledger(400), &options);
        assert_eq!(rows.len(), 10);
    }

    #[test]
    fn test_convert_sheet_cells() {
        let sheet = ledger(3);
        let rows = SampledRowSet::leading(3, None);
        let doc = convert_sheet(&sheet, &rows, &BTreeSet::new(), &ConvertOptions::default());

        assert_eq!(doc.metadata.title, "Ledger");
        assert_eq!(doc.metadata.dimensions, "A1:C3");
        assert_eq!(doc.metadata.max_row, 3);
        assert_eq!(doc.cells.len(), 9);

        let total = &doc.cells[&"C2".parse::<CellAddress>().unwrap()];
        assert_eq!(total.value.formula(), Some("=A2*B2"));
        assert_eq!(
            total.dependencies.as_ref().map(|d| d.cell_references.clone()),
            Some(vec!["A2".to_string(), "B2".to_string()])
        );
    }

    #[test]
    fn test_formulas_only_caps_data_cells() {
        let mut sheet = MemorySheet::new("Mixed");
        for row in 1..=200 {
            sheet.set_value(row, 1, row);
        }
        sheet.set_formula(1, 2, "=A150*2", json!(300));

        let options = ConvertOptions {
            formulas_only: true,
            ..Default::default()
        };
        let rows = SampledRowSet::leading(200, None);
        let doc = convert_sheet(&sheet, &rows, &BTreeSet::new(), &options);

        // formula + its dependency + the data-cell budget
        assert_eq!(doc.cells.len(), 1 + 1 + FORMULAS_ONLY_DATA_CELLS);
        assert!(doc.cells.contains_key(&"A150".parse::<CellAddress>().unwrap()));
        assert!(!doc.cells.contains_key(&"A200".parse::<CellAddress>().unwrap()));
    }

    #[test]
    fn test_context_built_from_emitted_cells() {
        let sheet = ledger(6);
        let rows = SampledRowSet::leading(6, None);
        let mut documents = BTreeMap::new();
        documents.insert(
            "Ledger".to_string(),
            convert_sheet(&sheet, &rows, &BTreeSet::new(), &ConvertOptions::default()),
        );

        let context = build_context(&documents, &[sheet], &[]);
        assert_eq!(context.formula_patterns["pattern_01"], "=A[n]*B[n]");
        assert_eq!(context.column_types["Ledger!C"], "decimal");
        assert_eq!(context.samples.len(), 5);
        assert!(context.implementation_notes.contains_key("js_equivalent"));
    }
}
