//! Cell values and the in-memory sheet built by the reader

use super::package::{PivotTableInfo, ValidationRule};
use super::SheetSource;
use crate::types::{column_letter, CellAddress};
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of the value a cell holds (or caches, for formula cells)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Text,
    Boolean,
    Date,
    DateTime,
    Error,
    Empty,
}

impl ValueKind {
    /// Infer the kind of an already-encoded JSON value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::Text,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Null => ValueKind::Empty,
            _ => ValueKind::Text,
        }
    }
}

/// One cell as supplied by the reading layer
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCell {
    /// Cell value, already encoded as JSON (cached result for formulas)
    pub value: Value,
    pub kind: ValueKind,
    /// Formula text with a leading `=`
    pub formula: Option<String>,
    pub data_validation: Option<Value>,
    pub hyperlink: Option<Value>,
    pub comment: Option<Value>,
}

impl SourceCell {
    pub fn value(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            kind: ValueKind::of(&value),
            value,
            formula: None,
            data_validation: None,
            hyperlink: None,
            comment: None,
        }
    }

    pub fn with_kind(value: Value, kind: ValueKind) -> Self {
        Self {
            kind,
            ..Self::value(value)
        }
    }

    /// Formula cell; a missing leading `=` is added
    pub fn formula(formula: &str, cached: impl Into<Value>) -> Self {
        let formula = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        };
        Self {
            formula: Some(formula),
            ..Self::value(cached)
        }
    }

    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.formula.is_none() && self.value.is_null()
    }
}

/// A worksheet held in memory with 1-based row/column coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheet {
    name: String,
    cells: BTreeMap<(u32, u32), SourceCell>,
    max_row: u32,
    max_column: u32,
    validations: Vec<ValidationRule>,
    pivot_tables: Vec<PivotTableInfo>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Grow the sheet extent without adding cells (trailing blank rows)
    pub fn extend_to(&mut self, rows: u32, columns: u32) {
        self.max_row = self.max_row.max(rows);
        self.max_column = self.max_column.max(columns);
    }

    pub fn insert(&mut self, row: u32, column: u32, cell: SourceCell) {
        if row == 0 || column == 0 {
            return;
        }
        self.extend_to(row, column);
        self.cells.insert((row, column), cell);
    }

    pub fn set_value(&mut self, row: u32, column: u32, value: impl Into<Value>) {
        self.insert(row, column, SourceCell::value(value));
    }

    pub fn set_formula(&mut self, row: u32, column: u32, formula: &str, cached: impl Into<Value>) {
        self.insert(row, column, SourceCell::formula(formula, cached));
    }

    /// Every stored cell in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (CellAddress, &SourceCell)> {
        self.cells
            .iter()
            .map(|(&(row, column), cell)| (CellAddress::new(row, column), cell))
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = (CellAddress, &mut SourceCell)> {
        self.cells
            .iter_mut()
            .map(|(&(row, column), cell)| (CellAddress::new(row, column), cell))
    }

    /// Data validation rules declared on the sheet, in file order
    pub fn validations(&self) -> &[ValidationRule] {
        &self.validations
    }

    pub fn set_validations(&mut self, rules: Vec<ValidationRule>) {
        self.validations = rules;
    }

    pub fn pivot_tables(&self) -> &[PivotTableInfo] {
        &self.pivot_tables
    }

    pub fn set_pivot_tables(&mut self, pivots: Vec<PivotTableInfo>) {
        self.pivot_tables = pivots;
    }

    /// Used range as `A1:D20`
    pub fn dimensions(&self) -> String {
        let min_row = self.cells.keys().map(|(r, _)| *r).min().unwrap_or(1);
        let min_column = self.cells.keys().map(|(_, c)| *c).min().unwrap_or(1);
        format!(
            "{}{}:{}{}",
            column_letter(min_column),
            min_row,
            column_letter(self.max_column.max(1)),
            self.max_row.max(1)
        )
    }
}

impl SheetSource for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_count(&self) -> u32 {
        self.max_row
    }

    fn column_count(&self) -> u32 {
        self.max_column
    }

    fn cell(&self, row: u32, column: u32) -> Option<&SourceCell> {
        self.cells.get(&(row, column))
    }

    fn row_cells(&self, row: u32) -> Vec<(u32, &SourceCell)> {
        self.cells
            .range((row, 0)..=(row, u32::MAX))
            .map(|(&(_, column), cell)| (column, cell))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_sheet() {
        let sheet = MemorySheet::new("Empty");
        assert_eq!(sheet.row_count(), 0);
        assert_eq!(sheet.column_count(), 0);
        assert_eq!(sheet.dimensions(), "A1:A1");
        assert!(sheet.cell(1, 1).is_none());
    }

    #[test]
    fn test_insert_tracks_extent() {
        let mut sheet = MemorySheet::new("Data");
        sheet.set_value(2, 2, "Revenue");
        sheet.set_formula(5, 4, "B2*2", json!(0));

        assert_eq!(sheet.row_count(), 5);
        assert_eq!(sheet.column_count(), 4);
        assert_eq!(sheet.dimensions(), "B2:D5");
        assert_eq!(
            sheet.cell(5, 4).and_then(|c| c.formula.clone()),
            Some("=B2*2".to_string())
        );
    }

    #[test]
    fn test_row_cells_left_to_right() {
        let mut sheet = MemorySheet::new("Data");
        sheet.set_value(3, 3, 3);
        sheet.set_value(3, 1, 1);
        sheet.set_value(4, 1, "next row");

        let columns: Vec<u32> = sheet.row_cells(3).into_iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec![1, 3]);
    }

    #[test]
    fn test_value_kind_inference() {
        assert_eq!(SourceCell::value(1.5).kind, ValueKind::Number);
        assert_eq!(SourceCell::value("x").kind, ValueKind::Text);
        assert_eq!(SourceCell::value(true).kind, ValueKind::Boolean);
        assert!(SourceCell::value(Value::Null).is_empty());
        assert!(!SourceCell::formula("=A1", Value::Null).is_empty());
    }
}
