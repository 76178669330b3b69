//! Workbook reader over calamine (.xlsx, .xlsm, .xls)

use super::{MemorySheet, ReaderCapabilities, SheetSource, SourceCell, ValueKind, XlsxPackage};
use crate::error::{DigestError, DigestResult};
use crate::types::{column_letter, NamedRange, NamedRangeValue};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// File extensions the reader accepts (lowercase, without the dot)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

/// Whether `path` has a supported spreadsheet extension
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// A table (ListObject) declared in the workbook
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub sheet: String,
    pub columns: Vec<String>,
    pub first_column: u32,
    pub header_row: u32,
    pub last_row: u32,
}

impl TableDefinition {
    /// Table extent including the header row, e.g. `A1:C20`
    pub fn range(&self) -> String {
        let last_column = self.first_column + (self.columns.len() as u32).saturating_sub(1);
        format!(
            "{}{}:{}{}",
            column_letter(self.first_column),
            self.header_row,
            column_letter(last_column),
            self.last_row
        )
    }
}

/// Open spreadsheet file
pub struct WorkbookReader {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
    /// Raw package access for xlsx/xlsm; `None` for .xls
    package: Option<XlsxPackage<BufReader<File>>>,
}

impl WorkbookReader {
    /// Open a workbook, checking existence and extension first
    pub fn open(path: impl AsRef<Path>) -> DigestResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DigestError::InputNotFound(path.to_path_buf()));
        }
        if !is_supported(path) {
            return Err(DigestError::UnsupportedFormat(path.to_path_buf()));
        }

        let workbook = open_workbook_auto(path).map_err(|e| DigestError::LoadFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // Cell details beyond values and formulas are optional
        let package = match &workbook {
            Sheets::Xlsx(_) => match XlsxPackage::open(path) {
                Ok(package) => Some(package),
                Err(e) => {
                    tracing::warn!(file = %path.display(), "Could not open package parts: {}", e);
                    None
                }
            },
            _ => None,
        };

        Ok(Self {
            path: path.to_path_buf(),
            workbook,
            package,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base file name, e.g. `Budget.xlsx`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Validations, hyperlinks, comments and pivot tables come from the
    /// xlsx package; .xls files supply values and formulas only
    pub fn capabilities(&self) -> ReaderCapabilities {
        let package = self.package.is_some();
        ReaderCapabilities {
            data_validation: package,
            hyperlinks: package,
            comments: package,
            pivot_tables: package,
        }
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    /// Read one sheet's values and formulas into memory
    pub fn read_sheet(&mut self, name: &str) -> DigestResult<MemorySheet> {
        let values = self
            .workbook
            .worksheet_range(name)
            .map_err(|e| DigestError::LoadFailure {
                path: self.path.clone(),
                reason: format!("sheet '{}': {}", name, e),
            })?;

        // Formulas are optional: a sheet whose formula part cannot be read
        // still yields its values
        let formulas = match self.workbook.worksheet_formula(name) {
            Ok(range) => Some(range),
            Err(e) => {
                tracing::warn!(
                    file = %self.path.display(),
                    sheet = name,
                    "Could not read formulas: {}",
                    e
                );
                None
            }
        };

        let mut sheet = MemorySheet::new(name);
        fill_values(&mut sheet, &values, &self.path);
        if let Some(formulas) = &formulas {
            fill_formulas(&mut sheet, formulas);
        }
        if let Some(package) = &mut self.package {
            match package.sheet_parts(name) {
                Ok(parts) => parts.apply_to(&mut sheet),
                Err(e) => tracing::warn!(
                    file = %self.path.display(),
                    sheet = name,
                    "Could not read validations, links or comments: {}",
                    e
                ),
            }
        }
        Ok(sheet)
    }

    /// Read every sheet; sheets that fail are logged and skipped
    pub fn read_sheets(&mut self) -> Vec<MemorySheet> {
        let mut sheets = Vec::new();
        for name in self.sheet_names() {
            match self.read_sheet(&name) {
                Ok(sheet) => sheets.push(sheet),
                Err(e) => tracing::warn!(
                    file = %self.path.display(),
                    sheet = %name,
                    "Skipping sheet: {}",
                    e
                ),
            }
        }
        sheets
    }

    /// Workbook-level defined names.
    ///
    /// `=` and `$` markers are dropped and unqualified references get the
    /// first sheet's name. Built-in `_xlnm.` names (print areas, filters)
    /// are skipped.
    pub fn named_ranges(&self) -> BTreeMap<String, NamedRange> {
        let first_sheet = self.sheet_names().into_iter().next().unwrap_or_default();
        let mut ranges = BTreeMap::new();

        for (name, formula) in self.workbook.defined_names() {
            if name.starts_with("_xlnm.") {
                tracing::debug!("Skipping built-in name {}", name);
                continue;
            }

            let refs: Vec<String> = formula
                .trim_start_matches('=')
                .split(',')
                .map(|part| part.trim().replace('$', ""))
                .filter(|part| !part.is_empty())
                .map(|part| {
                    if part.contains('!') || first_sheet.is_empty() {
                        part
                    } else {
                        format!("{}!{}", first_sheet, part)
                    }
                })
                .collect();

            let value = match refs.len() {
                0 => continue,
                1 => NamedRangeValue::Single(refs[0].clone()),
                _ => NamedRangeValue::Multiple(refs),
            };
            ranges.insert(
                name.clone(),
                NamedRange {
                    value,
                    scope: "workbook".to_string(),
                },
            );
        }

        ranges
    }

    /// Tables declared in the workbook (xlsx/xlsm only)
    pub fn tables(&mut self) -> Vec<TableDefinition> {
        let Sheets::Xlsx(xlsx) = &mut self.workbook else {
            return Vec::new();
        };

        if let Err(e) = xlsx.load_tables() {
            tracing::warn!(file = %self.path.display(), "Could not load tables: {}", e);
            return Vec::new();
        }

        let names: Vec<String> = xlsx.table_names().into_iter().cloned().collect();
        let mut tables = Vec::with_capacity(names.len());

        for name in names {
            let table = match xlsx.table_by_name(&name) {
                Ok(table) => table,
                Err(e) => {
                    tracing::warn!(file = %self.path.display(), table = %name, "Could not read table: {}", e);
                    continue;
                }
            };

            // Data range excludes the header row
            let (Some((first_row, first_col)), Some((last_row, _))) =
                (table.data().start(), table.data().end())
            else {
                tracing::debug!("Table {} has no data rows", name);
                continue;
            };

            tables.push(TableDefinition {
                name: table.name().to_string(),
                sheet: table.sheet_name().to_string(),
                columns: table.columns().to_vec(),
                first_column: first_col + 1,
                header_row: first_row.max(1),
                last_row: last_row + 1,
            });
        }

        tables
    }
}

fn fill_values(sheet: &mut MemorySheet, range: &Range<Data>, path: &Path) {
    let Some((start_row, start_col)) = range.start() else {
        return;
    };
    if let Some((end_row, end_col)) = range.end() {
        sheet.extend_to(end_row + 1, end_col + 1);
    }

    for (row, col, data) in range.used_cells() {
        let row = start_row + row as u32 + 1;
        let column = start_col + col as u32 + 1;
        let (value, kind) = encode_data(data);

        if kind == ValueKind::Number && value.is_null() {
            tracing::warn!(
                file = %path.display(),
                sheet = sheet.name(),
                cell = %format!("{}{}", column_letter(column), row),
                "Non-finite number replaced with null"
            );
        }

        sheet.insert(row, column, SourceCell::with_kind(value, kind));
    }
}

fn fill_formulas(sheet: &mut MemorySheet, range: &Range<String>) {
    let Some((start_row, start_col)) = range.start() else {
        return;
    };

    for (row, col, formula) in range.used_cells() {
        if formula.is_empty() {
            continue;
        }
        let row = start_row + row as u32 + 1;
        let column = start_col + col as u32 + 1;

        let cached = sheet
            .cell(row, column)
            .map(|cell| cell.value.clone())
            .unwrap_or(Value::Null);
        sheet.insert(row, column, SourceCell::formula(formula, cached));
    }
}

/// JSON encoding of a calamine cell value
pub(crate) fn encode_data(data: &Data) -> (Value, ValueKind) {
    match data {
        Data::Int(i) => (Value::from(*i), ValueKind::Number),
        Data::Float(f) => (encode_float(*f), ValueKind::Number),
        Data::String(s) => (Value::String(s.clone()), ValueKind::Text),
        Data::Bool(b) => (Value::Bool(*b), ValueKind::Boolean),
        Data::DateTime(dt) => encode_serial_date(dt.as_f64()),
        Data::DateTimeIso(s) => (Value::String(s.clone()), ValueKind::DateTime),
        Data::DurationIso(s) => (Value::String(s.clone()), ValueKind::Text),
        Data::Error(_) => (Value::Null, ValueKind::Error),
        Data::Empty => (Value::Null, ValueKind::Empty),
    }
}

fn encode_float(f: f64) -> Value {
    // Whole numbers are written without a fractional part
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return Value::from(f as i64);
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Excel serial date (1900 system) to ISO-8601 text
fn encode_serial_date(serial: f64) -> (Value, ValueKind) {
    let Some(datetime) = serial_to_datetime(serial) else {
        return (encode_float(serial), ValueKind::Number);
    };
    if serial.fract() == 0.0 {
        (
            Value::String(datetime.date().format("%Y-%m-%d").to_string()),
            ValueKind::Date,
        )
    } else {
        (
            Value::String(datetime.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ValueKind::DateTime,
        )
    }
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}
