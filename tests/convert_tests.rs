//! End-to-end conversion of generated workbooks

use pretty_assertions::assert_eq;
use rust_xlsxwriter::{DataValidation, Formula, Note, Workbook};
use serde_json::json;
use sheetdigest::batch::{convert_batch, find_spreadsheets};
use sheetdigest::converter::{convert_workbook, write_workbook_json, ConvertOptions, OutputOptions};
use sheetdigest::merge::load_document;
use sheetdigest::sampling::SamplingOptions;
use sheetdigest::types::{CellAddress, NamedRangeValue};
use sheetdigest::KeyMode;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// "Ledger" with `data_rows` rows of `=A{r}*B{r}` under a header, and a
/// "Summary" sheet using the defined name `Rate`
fn write_ledger(path: &Path, data_rows: u32) {
    let mut workbook = Workbook::new();

    let ledger = workbook.add_worksheet();
    ledger.set_name("Ledger").unwrap();
    ledger.write_string(0, 0, "Qty").unwrap();
    ledger.write_string(0, 1, "Price").unwrap();
    ledger.write_string(0, 2, "Total").unwrap();
    for row in 1..=data_rows {
        let excel_row = row + 1;
        ledger.write_number(row, 0, row as f64).unwrap();
        ledger.write_number(row, 1, 2.5).unwrap();
        let formula = format!("=A{}*B{}", excel_row, excel_row);
        ledger
            .write_formula(row, 2, Formula::new(formula.as_str()))
            .unwrap();
    }

    let summary = workbook.add_worksheet();
    summary.set_name("Summary").unwrap();
    summary.write_string(0, 0, "Total").unwrap();
    let total = format!("=SUM(Ledger!C2:C{})*Rate", data_rows + 1);
    summary
        .write_formula(0, 1, Formula::new(total.as_str()))
        .unwrap();
    summary.write_string(1, 0, "Rate").unwrap();
    summary.write_number(1, 1, 1.1).unwrap();

    workbook.define_name("Rate", "=Summary!$B$2").unwrap();
    workbook.save(path).unwrap();
}

fn address(text: &str) -> CellAddress {
    text.parse().unwrap()
}

#[test]
fn test_convert_with_sampling() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Ledger.xlsx");
    write_ledger(&path, 300);

    let options = ConvertOptions {
        sampling: Some(SamplingOptions::default()),
        ..Default::default()
    };
    let document = convert_workbook(&path, &options).unwrap();

    assert_eq!(document.file_name, "Ledger.xlsx");
    assert_eq!(document.sheets.len(), 2);

    let ledger = &document.sheets["Ledger"];
    assert_eq!(ledger.metadata.max_row, 301);
    assert_eq!(ledger.metadata.max_column, 3);
    assert!(ledger.cells.len() < 301 * 3);
    assert_eq!(ledger.cells[&address("C2")].value.formula(), Some("=A2*B2"));
    assert_eq!(ledger.cells[&address("C301")].value.formula(), Some("=A301*B301"));
    assert!(ledger.cells.contains_key(&address("A1")));

    // Small sheets are kept whole
    let summary = &document.sheets["Summary"];
    assert_eq!(summary.cells.len(), 4);
    let deps = summary.cells[&address("B1")].dependencies.clone().unwrap();
    assert_eq!(deps.named_ranges, vec!["Rate".to_string()]);
    assert!(deps.cell_references.contains(&"C2:C301".to_string()));

    assert_eq!(
        document.named_ranges["Rate"].value,
        NamedRangeValue::Single("Summary!B2".to_string())
    );

    let context = document.enriched_context.as_ref().unwrap();
    assert_eq!(context.formula_patterns["pattern_01"], "=A[n]*B[n]");
    assert_eq!(context.column_types["Ledger!A"], "decimal");
    assert!(context.implementation_notes.contains_key("js_equivalent"));
}

#[test]
fn test_convert_with_row_limit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Ledger.xlsx");
    write_ledger(&path, 100);

    let options = ConvertOptions {
        row_limit: Some(10),
        include_context: false,
        ..Default::default()
    };
    let document = convert_workbook(&path, &options).unwrap();

    assert_eq!(document.sheets["Ledger"].cells.len(), 30);
    assert!(document.enriched_context.is_none());
}

/// "Tasks" with a status dropdown over A2:A20, a link in B1 and a note on A2
fn write_tasks(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Tasks").unwrap();
    sheet.write_string(0, 0, "Status").unwrap();
    for row in 1..=5 {
        sheet.write_string(row, 0, "Open").unwrap();
    }
    let status = DataValidation::new()
        .allow_list_strings(&["Open", "Closed"])
        .unwrap();
    sheet.add_data_validation(1, 0, 19, 0, &status).unwrap();
    sheet.write_url(0, 1, "https://example.com/board").unwrap();
    sheet
        .insert_note(1, 0, &Note::new("Triage first").set_author("Sam"))
        .unwrap();
    workbook.save(path).unwrap();
}

#[test]
fn test_keep_formatting_attaches_cell_details() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Tasks.xlsx");
    write_tasks(&path);

    let options = ConvertOptions {
        keep_formatting: true,
        ..Default::default()
    };
    let document = convert_workbook(&path, &options).unwrap();
    let cells = &document.sheets["Tasks"].cells;

    let first = &cells[&CellAddress::new(2, 1)];
    assert_eq!(first.data_validation.as_ref().unwrap()["type"], "list");
    assert_eq!(first.comment.as_ref().unwrap()["author"], "Sam");
    assert!(cells[&CellAddress::new(1, 1)].data_validation.is_none());
    assert_eq!(
        cells[&CellAddress::new(1, 2)].hyperlink.as_ref().unwrap()["target"],
        "https://example.com/board"
    );
}

#[test]
fn test_cell_details_need_keep_formatting() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Tasks.xlsx");
    write_tasks(&path);

    let document = convert_workbook(&path, &ConvertOptions::default()).unwrap();
    assert!(document.sheets["Tasks"].cells.values().all(|cell| {
        cell.data_validation.is_none() && cell.hyperlink.is_none() && cell.comment.is_none()
    }));

    // The context still lists the rule once, anchored at its first cell
    let context = document.enriched_context.unwrap();
    assert_eq!(
        context.validation["Tasks"],
        vec![json!({
            "cell": "A2",
            "type": "list",
            "formula1": "\"Open,Closed\"",
            "dropdown": true,
            "values": ["Open", "Closed"]
        })]
    );
    assert!(context.pivot_tables.is_empty());
}

#[test]
fn test_written_document_reloads_in_both_modes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Ledger.xlsx");
    write_ledger(&path, 80);

    for key_mode in [KeyMode::Abbreviated, KeyMode::Full] {
        let mut document = convert_workbook(&path, &ConvertOptions::default()).unwrap();
        let options = OutputOptions {
            output_dir: dir.path().join(format!("{:?}", key_mode)),
            key_mode,
            minify: true,
        };
        let written = write_workbook_json(&mut document, &path, &options).unwrap();

        let reloaded = load_document(&written.path).unwrap();
        assert_eq!(reloaded.sheets, document.sheets);
        assert_eq!(reloaded.named_ranges, document.named_ranges);
        assert_eq!(reloaded.enriched_context, document.enriched_context);
        assert_eq!(reloaded.metadata.unwrap().key_mode, Some(key_mode));
    }
}

#[test]
fn test_abbreviated_output_is_smaller() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Ledger.xlsx");
    write_ledger(&path, 40);

    let mut tokens = Vec::new();
    for key_mode in [KeyMode::Abbreviated, KeyMode::Full] {
        let mut document = convert_workbook(&path, &ConvertOptions::default()).unwrap();
        let options = OutputOptions {
            output_dir: dir.path().join("out"),
            key_mode,
            minify: false,
        };
        let written = write_workbook_json(&mut document, &path, &options).unwrap();
        tokens.push((written.token_count, fs::metadata(&written.path).unwrap().len()));
    }

    assert!(tokens[0].1 < tokens[1].1);
}

#[test]
fn test_batch_over_directory() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(input.join("nested")).unwrap();
    write_ledger(&input.join("North.xlsx"), 20);
    write_ledger(&input.join("nested/South.xlsx"), 60);
    fs::write(input.join("Broken.xlsx"), "not a workbook").unwrap();
    fs::write(input.join("notes.txt"), "ignored").unwrap();

    let files: Vec<PathBuf> = find_spreadsheets(&[input.to_string_lossy().into_owned()]);
    assert_eq!(files.len(), 3);

    let output = OutputOptions {
        output_dir: dir.path().join("converted_json"),
        ..Default::default()
    };
    let convert = ConvertOptions {
        sampling: Some(SamplingOptions::default()),
        ..Default::default()
    };
    let report = convert_batch(&files, &convert, &output, 2).unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(report.average_tokens().unwrap() > 0.0);
    for path in report.written_paths() {
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join("converted_json")));
    }
}
