use crate::schema::KeyMode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

//==============================================================================
// Cell addressing
//==============================================================================

/// Convert a 1-based column number to spreadsheet letters (1→A, 26→Z, 27→AA)
pub fn column_letter(column: u32) -> String {
    let mut result = String::new();
    let mut num = column.saturating_sub(1);

    loop {
        let remainder = num % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if num < 26 {
            break;
        }
        num = num / 26 - 1;
    }

    result
}

/// Convert spreadsheet column letters to a 1-based column number (A→1, AA→27)
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// A1-style cell address, 1-based. Orders row-major so cell maps serialize
/// in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: u32,
    pub column: u32,
}

impl CellAddress {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letter(self.column), self.row)
    }
}

impl FromStr for CellAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean = s.replace('$', "");
        let split = clean
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("invalid cell address '{}'", s))?;
        let (letters, digits) = clean.split_at(split);
        let column =
            column_number(letters).ok_or_else(|| format!("invalid cell address '{}'", s))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| format!("invalid cell address '{}'", s))?;
        if row == 0 {
            return Err(format!("invalid cell address '{}'", s));
        }
        Ok(Self { row, column })
    }
}

impl Serialize for CellAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CellAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

//==============================================================================
// Cells
//==============================================================================

/// Formula cell payload; the calculated value is the cached result stored in
/// the file, never evaluated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaValue {
    pub formula: String,
    #[serde(default)]
    pub calculated_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Formula(FormulaValue),
    Scalar(Value),
}

impl CellValue {
    pub fn formula(&self) -> Option<&str> {
        match self {
            CellValue::Formula(f) => Some(&f.formula),
            CellValue::Scalar(_) => None,
        }
    }
}

/// References a formula depends on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cell_references: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub named_ranges: Vec<String>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.cell_references.is_empty() && self.named_ranges.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_validation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Value>,
}

impl CellRecord {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            dependencies: None,
            data_validation: None,
            hyperlink: None,
            comment: None,
        }
    }
}

//==============================================================================
// Sheets and workbooks
//==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub dimensions: String,
    #[serde(default)]
    pub max_row: u32,
    #[serde(default)]
    pub max_column: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetDocument {
    #[serde(default)]
    pub metadata: SheetMetadata,
    #[serde(default)]
    pub cells: BTreeMap<CellAddress, CellRecord>,
}

impl SheetDocument {
    /// Iterate formula cells as (address, formula)
    pub fn formulas(&self) -> impl Iterator<Item = (&CellAddress, &str)> {
        self.cells
            .iter()
            .filter_map(|(addr, cell)| cell.value.formula().map(|f| (addr, f)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamedRangeValue {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRange {
    pub value: NamedRangeValue,
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_scope() -> String {
    "workbook".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    #[serde(default)]
    pub col: Option<String>,
}

/// Table structure, either declared in the file or inferred from structured
/// references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub columns: Vec<TableColumn>,
    #[serde(default)]
    pub header_row: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedContext {
    #[serde(default)]
    pub tables: BTreeMap<String, TableInfo>,
    #[serde(default)]
    pub column_types: BTreeMap<String, String>,
    #[serde(default)]
    pub formula_patterns: BTreeMap<String, String>,
    #[serde(default)]
    pub implementation_notes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub samples: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validation: BTreeMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pivot_tables: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub token_count: usize,
    #[serde(default)]
    pub conversion_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_mode: Option<KeyMode>,
}

/// A converted single workbook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbookDocument {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub named_ranges: BTreeMap<String, NamedRange>,
    #[serde(default)]
    pub sheets: BTreeMap<String, SheetDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_context: Option<EnrichedContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
}

impl WorkbookDocument {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// File name recorded at conversion time, falling back to `file_name`
    pub fn original_filename(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.original_filename.as_deref())
            .or_else(|| (!self.file_name.is_empty()).then_some(self.file_name.as_str()))
    }

    pub fn cell_count(&self) -> usize {
        self.sheets.values().map(|s| s.cells.len()).sum()
    }
}

//==============================================================================
// Consolidated documents
//==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbookEntry {
    pub file_name: String,
    #[serde(default)]
    pub sheets: BTreeMap<String, SheetDocument>,
    #[serde(default)]
    pub named_ranges: BTreeMap<String, NamedRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedMetadata {
    pub workbook_count: usize,
    pub conversion_timestamp: String,
    #[serde(default)]
    pub token_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_mode: Option<KeyMode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedDocument {
    pub workbooks: BTreeMap<String, WorkbookEntry>,
    pub cross_references: BTreeMap<String, Vec<String>>,
    pub enriched_context: EnrichedContext,
    pub metadata: ConsolidatedMetadata,
}
