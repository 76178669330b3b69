//! Spreadsheet access layer
//!
//! The sampling and analysis code only sees [`SheetSource`]; the calamine
//! specifics stay in [`reader`] and raw xlsx parts in [`package`].

mod package;
mod reader;
mod sheet;

pub use package::{
    CellComment, CellRange, Hyperlink, PivotDataField, PivotTableInfo, SheetParts,
    ValidationRule, XlsxPackage, MAX_PIVOT_TABLES,
};
pub use reader::{is_supported, TableDefinition, WorkbookReader, SUPPORTED_EXTENSIONS};
pub use sheet::{MemorySheet, SourceCell, ValueKind};

/// Read-only view of one worksheet, 1-based coordinates
pub trait SheetSource {
    fn name(&self) -> &str;

    /// Index of the last row in use (0 for an empty sheet)
    fn row_count(&self) -> u32;

    /// Index of the last column in use
    fn column_count(&self) -> u32;

    fn cell(&self, row: u32, column: u32) -> Option<&SourceCell>;

    /// Stored cells of one row, left to right
    fn row_cells(&self, row: u32) -> Vec<(u32, &SourceCell)> {
        (1..=self.column_count())
            .filter_map(|column| self.cell(row, column).map(|cell| (column, cell)))
            .collect()
    }
}

/// Optional cell details a reader is able to supply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderCapabilities {
    pub data_validation: bool,
    pub hyperlinks: bool,
    pub comments: bool,
    pub pivot_tables: bool,
}

impl ReaderCapabilities {
    /// True when any formatting-related detail is available
    pub fn any(&self) -> bool {
        self.data_validation || self.hyperlinks || self.comments || self.pivot_tables
    }
}
