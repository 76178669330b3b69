//! Row classification by formula structure

use super::normalizer::normalize_formula;
use crate::workbook::SheetSource;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Number of leading and trailing rows treated as header and footer
pub const BOUNDARY_ROWS: u32 = 5;

/// Rows of one sheet grouped by what they hold.
///
/// Every row with a formula is in exactly one of `unique_formula_rows` or
/// `duplicate_formula_rows`. Header and footer rows are fixed index windows
/// and may overlap each other and the other sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowClassification {
    pub header_rows: BTreeSet<u32>,
    pub footer_rows: BTreeSet<u32>,
    /// Rows holding at least one signature seen for the first time
    pub unique_formula_rows: BTreeSet<u32>,
    /// Formula rows whose signatures were all seen earlier
    pub duplicate_formula_rows: BTreeMap<u32, Vec<String>>,
    /// Rows without any formula cell (blank rows included)
    pub raw_data_rows: BTreeSet<u32>,
    /// Every row holding each signature
    pub pattern_to_rows: BTreeMap<String, BTreeSet<u32>>,
    /// Signatures of each formula row, left to right
    pub row_signatures: BTreeMap<u32, Vec<String>>,
}

impl RowClassification {
    /// Number of distinct formula shapes in the sheet
    pub fn pattern_count(&self) -> usize {
        self.pattern_to_rows.len()
    }
}

/// Classify every row of `sheet` in one row-major pass
pub fn classify(sheet: &dyn SheetSource) -> RowClassification {
    let row_count = sheet.row_count();
    let mut classification = RowClassification {
        header_rows: (1..=row_count.min(BOUNDARY_ROWS)).collect(),
        footer_rows: (row_count.saturating_sub(BOUNDARY_ROWS - 1).max(1)..=row_count).collect(),
        ..Default::default()
    };

    let mut seen: HashSet<String> = HashSet::new();

    for row in 1..=row_count {
        let mut has_formula = false;
        let mut first_seen = false;
        let mut signatures = Vec::new();

        for (_, cell) in sheet.row_cells(row) {
            let Some(formula) = cell.formula.as_deref() else {
                continue;
            };
            has_formula = true;

            let signature = normalize_formula(formula);
            if signature.is_empty() {
                continue;
            }
            if seen.insert(signature.clone()) {
                first_seen = true;
            }
            classification
                .pattern_to_rows
                .entry(signature.clone())
                .or_default()
                .insert(row);
            signatures.push(signature);
        }

        if !signatures.is_empty() {
            classification.row_signatures.insert(row, signatures.clone());
        }

        if !has_formula {
            classification.raw_data_rows.insert(row);
        } else if first_seen {
            classification.unique_formula_rows.insert(row);
        } else {
            classification.duplicate_formula_rows.insert(row, signatures);
        }
    }

    classification
}
