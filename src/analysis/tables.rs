//! Table structure: declared tables plus tables inferred from structured
//! references such as `Sales[[#This Row],[Qty]]`

use crate::types::{column_letter, TableColumn, TableInfo};
use crate::workbook::{MemorySheet, SheetSource, TableDefinition};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Rows and columns searched for an inferred table's header
const HEADER_SCAN_ROWS: u32 = 9;
const HEADER_SCAN_COLUMNS: u32 = 29;

/// Inferred tables are assumed to span at least this many data rows
const MIN_INFERRED_HEIGHT: u32 = 100;

fn structured_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Za-z0-9_]+)\[\[#.*?\],\[([^\]]+)\]\]")
            .expect("structured reference regex must compile")
    })
}

/// Table name → referenced column names, across every formula of `sheets`
pub fn structured_references(sheets: &[MemorySheet]) -> BTreeMap<String, BTreeSet<String>> {
    let mut refs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for sheet in sheets {
        for (_, cell) in sheet.cells() {
            let Some(formula) = cell.formula.as_deref() else {
                continue;
            };
            for caps in structured_ref_re().captures_iter(formula) {
                refs.entry(caps[1].to_string())
                    .or_default()
                    .insert(caps[2].to_string());
            }
        }
    }
    refs
}

/// Declared tables first; structured references add tables the workbook
/// does not declare. Tables without columns are dropped.
pub fn extract_tables(
    declared: &[TableDefinition],
    sheets: &[MemorySheet],
) -> BTreeMap<String, TableInfo> {
    let mut tables: BTreeMap<String, TableInfo> = declared
        .iter()
        .map(|table| (table.name.clone(), declared_info(table)))
        .collect();

    for (name, columns) in structured_references(sheets) {
        if tables.contains_key(&name) {
            continue;
        }
        tracing::debug!("Inferring table {} from structured references", name);
        tables.insert(name, infer_table(&columns, sheets));
    }

    tables.retain(|_, info| !info.columns.is_empty());
    tables
}

fn declared_info(table: &TableDefinition) -> TableInfo {
    let columns = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| TableColumn {
            name: name.clone(),
            col: Some(column_letter(table.first_column + i as u32)),
        })
        .collect();

    TableInfo {
        range: Some(table.range()),
        columns,
        header_row: Some(table.header_row),
    }
}

/// Locate a header row holding at least half of `columns` (first sheet
/// that has one wins) and size the table from the data below it
fn infer_table(columns: &BTreeSet<String>, sheets: &[MemorySheet]) -> TableInfo {
    for sheet in sheets {
        let Some((header_row, positions)) = find_header(sheet, columns) else {
            continue;
        };

        let (Some(&min_col), Some(&max_col)) =
            (positions.values().min(), positions.values().max())
        else {
            continue;
        };

        let mut last_row = header_row + MIN_INFERRED_HEIGHT;
        for (address, cell) in sheet.cells() {
            if address.row > header_row
                && (min_col..=max_col).contains(&address.column)
                && !cell.is_empty()
            {
                last_row = last_row.max(address.row);
            }
        }

        let mut ordered: Vec<(&String, &u32)> = positions.iter().collect();
        ordered.sort_by_key(|(_, col)| **col);

        return TableInfo {
            range: Some(format!(
                "{}{}:{}{}",
                column_letter(min_col),
                header_row,
                column_letter(max_col),
                last_row
            )),
            columns: ordered
                .into_iter()
                .map(|(name, col)| TableColumn {
                    name: name.clone(),
                    col: Some(column_letter(*col)),
                })
                .collect(),
            header_row: Some(header_row),
        };
    }

    TableInfo {
        range: Some("Inferred".to_string()),
        columns: columns
            .iter()
            .map(|name| TableColumn {
                name: name.clone(),
                col: None,
            })
            .collect(),
        header_row: None,
    }
}

fn find_header(
    sheet: &MemorySheet,
    columns: &BTreeSet<String>,
) -> Option<(u32, BTreeMap<String, u32>)> {
    let last_row = sheet.row_count().min(HEADER_SCAN_ROWS);
    let last_col = sheet.column_count().min(HEADER_SCAN_COLUMNS);

    for row in 1..=last_row {
        let mut positions = BTreeMap::new();
        for column in 1..=last_col {
            if let Some(Value::String(text)) = sheet.cell(row, column).map(|c| &c.value) {
                if columns.contains(text) {
                    positions.insert(text.clone(), column);
                }
            }
        }
        if !positions.is_empty() && positions.len() * 2 >= columns.len() {
            return Some((row, positions));
        }
    }
    None
}
