//! Worksheet details calamine does not expose, read straight from the xlsx
//! package: data validations, hyperlinks, comments and pivot tables.

use super::MemorySheet;
use crate::error::{DigestError, DigestResult};
use crate::types::CellAddress;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

/// Pivot tables reported per sheet
pub const MAX_PIVOT_TABLES: usize = 5;

type XmlResult<T> = Result<T, quick_xml::Error>;

//==============================================================================
// Ranges and per-sheet details
//==============================================================================

/// Rectangular range such as `B2:D10` (a single cell is a 1x1 range)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first: CellAddress,
    pub last: CellAddress,
}

impl CellRange {
    pub fn parse(text: &str) -> Option<Self> {
        let (start, end) = text.split_once(':').unwrap_or((text, text));
        let a: CellAddress = start.parse().ok()?;
        let b: CellAddress = end.parse().ok()?;
        Some(Self {
            first: CellAddress::new(a.row.min(b.row), a.column.min(b.column)),
            last: CellAddress::new(a.row.max(b.row), a.column.max(b.column)),
        })
    }

    pub fn contains(&self, row: u32, column: u32) -> bool {
        (self.first.row..=self.last.row).contains(&row)
            && (self.first.column..=self.last.column).contains(&column)
    }
}

/// Space-separated `sqref` list; whole-row and whole-column forms are skipped
fn parse_sqref(text: &str) -> Vec<CellRange> {
    text.split_whitespace().filter_map(CellRange::parse).collect()
}

/// One `<dataValidation>` rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationRule {
    pub ranges: Vec<CellRange>,
    pub kind: String,
    pub operator: Option<String>,
    pub formula1: String,
    pub formula2: Option<String>,
    pub allow_blank: bool,
    pub show_error_message: bool,
    /// `showDropDown="1"` hides the in-cell list arrow
    pub hide_drop_down: bool,
    pub error_title: Option<String>,
    pub error: Option<String>,
    pub prompt_title: Option<String>,
    pub prompt: Option<String>,
}

impl ValidationRule {
    pub fn covers(&self, row: u32, column: u32) -> bool {
        self.ranges.iter().any(|range| range.contains(row, column))
    }

    /// Rules agreeing on type, operator and first formula are one rule
    pub fn identity(&self) -> (&str, Option<&str>, &str) {
        (&self.kind, self.operator.as_deref(), &self.formula1)
    }

    /// Complete rule, as attached to a validated cell
    pub fn to_cell_json(&self) -> Value {
        json!({
            "type": self.kind,
            "operator": self.operator,
            "formula1": self.formula1,
            "formula2": self.formula2,
            "allow_blank": self.allow_blank,
            "show_error_message": self.show_error_message,
            "error_title": self.error_title,
            "error_message": self.error,
            "prompt_title": self.prompt_title,
            "prompt_message": self.prompt,
        })
    }

    /// Compact rule for the enriched context, anchored at `cell`.
    ///
    /// Literal lists (`"Open,Closed"`) are also spelled out as `values`.
    pub fn to_context_json(&self, cell: &str) -> Value {
        let mut rule = Map::new();
        rule.insert("cell".to_string(), json!(cell));
        rule.insert("type".to_string(), json!(self.kind));
        rule.insert("formula1".to_string(), json!(self.formula1));
        if let Some(operator) = &self.operator {
            rule.insert("operator".to_string(), json!(operator));
        }
        if let Some(formula2) = &self.formula2 {
            rule.insert("formula2".to_string(), json!(formula2));
        }
        rule.insert("dropdown".to_string(), json!(!self.hide_drop_down));

        let list = self.formula1.as_str();
        if self.kind == "list" && list.len() >= 2 && list.starts_with('"') && list.ends_with('"') {
            let values: Vec<&str> = list[1..list.len() - 1].split(',').collect();
            rule.insert("values".to_string(), json!(values));
        }
        Value::Object(rule)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hyperlink {
    pub range: Option<CellRange>,
    pub target: Option<String>,
    pub location: Option<String>,
    pub tooltip: Option<String>,
}

impl Hyperlink {
    pub fn to_json(&self) -> Value {
        let mut link = Map::new();
        for (key, value) in [
            ("target", &self.target),
            ("tooltip", &self.tooltip),
            ("location", &self.location),
        ] {
            if let Some(value) = value {
                link.insert(key.to_string(), json!(value));
            }
        }
        Value::Object(link)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellComment {
    pub cell: CellAddress,
    pub text: String,
    pub author: Option<String>,
}

impl CellComment {
    pub fn to_json(&self) -> Value {
        json!({ "text": self.text, "author": self.author })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotDataField {
    pub name: String,
    /// Aggregation, `sum` when the file does not say
    pub function: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotTableInfo {
    pub name: String,
    pub location: Option<String>,
    pub row_fields: Vec<String>,
    pub column_fields: Vec<String>,
    pub page_fields: Vec<String>,
    pub data_fields: Vec<PivotDataField>,
}

impl PivotTableInfo {
    pub fn to_json(&self) -> Value {
        fn named(names: &[String]) -> Vec<Value> {
            names.iter().map(|name| json!({ "name": name })).collect()
        }

        let mut fields = Map::new();
        if !self.row_fields.is_empty() {
            fields.insert("row_fields".to_string(), json!(named(&self.row_fields)));
        }
        if !self.column_fields.is_empty() {
            fields.insert("column_fields".to_string(), json!(named(&self.column_fields)));
        }
        if !self.data_fields.is_empty() {
            let data: Vec<Value> = self
                .data_fields
                .iter()
                .map(|f| json!({ "name": f.name, "function": f.function }))
                .collect();
            fields.insert("data_fields".to_string(), json!(data));
        }
        if !self.page_fields.is_empty() {
            fields.insert("page_fields".to_string(), json!(named(&self.page_fields)));
        }

        let mut pivot = Map::new();
        pivot.insert("name".to_string(), json!(self.name));
        pivot.insert("location".to_string(), json!(self.location));
        if !fields.is_empty() {
            pivot.insert("fields".to_string(), Value::Object(fields));
        }
        Value::Object(pivot)
    }
}

/// Everything read from one worksheet's parts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetParts {
    pub validations: Vec<ValidationRule>,
    pub hyperlinks: Vec<Hyperlink>,
    pub comments: Vec<CellComment>,
    pub pivot_tables: Vec<PivotTableInfo>,
}

impl SheetParts {
    /// Attach cell-level details to the cells `sheet` already holds and hand
    /// over the sheet-level rules and pivot tables
    pub fn apply_to(self, sheet: &mut MemorySheet) {
        let comments: HashMap<CellAddress, &CellComment> =
            self.comments.iter().map(|c| (c.cell, c)).collect();

        for (address, cell) in sheet.cells_mut() {
            let (row, column) = (address.row, address.column);
            cell.data_validation = self
                .validations
                .iter()
                .find(|rule| rule.covers(row, column))
                .map(ValidationRule::to_cell_json);
            cell.hyperlink = self
                .hyperlinks
                .iter()
                .find(|link| link.range.is_some_and(|r| r.contains(row, column)))
                .map(Hyperlink::to_json);
            cell.comment = comments.get(&address).map(|c| c.to_json());
        }

        sheet.set_validations(self.validations);
        sheet.set_pivot_tables(self.pivot_tables);
    }
}

//==============================================================================
// Package access
//==============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Relationship {
    kind: String,
    target: String,
    external: bool,
}

impl Relationship {
    /// Last segment of the relationship type URI, e.g. `comments`
    fn is(&self, kind: &str) -> bool {
        self.kind.rsplit('/').next() == Some(kind)
    }
}

/// An xlsx/xlsm zip package with its sheet name → worksheet part mapping
pub struct XlsxPackage<R: Read + Seek> {
    archive: ZipArchive<R>,
    sheets: HashMap<String, String>,
}

impl XlsxPackage<BufReader<File>> {
    pub fn open(path: &Path) -> DigestResult<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> XlsxPackage<R> {
    pub fn from_reader(reader: R) -> DigestResult<Self> {
        let mut archive = ZipArchive::new(reader)?;

        let workbook = read_part(&mut archive, "xl/workbook.xml")?
            .ok_or_else(|| DigestError::Package("missing xl/workbook.xml".to_string()))?;
        let rels = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
            Some(xml) => parse_relationships(&xml)?,
            None => BTreeMap::new(),
        };

        let mut sheets = HashMap::new();
        for (name, id) in parse_workbook_sheets(&workbook)? {
            if let Some(rel) = rels.get(&id) {
                sheets.insert(name, resolve_target("xl", &rel.target));
            }
        }

        Ok(Self { archive, sheets })
    }

    /// Worksheet part of `sheet`, e.g. `xl/worksheets/sheet1.xml`
    pub fn sheet_part(&self, sheet: &str) -> Option<&str> {
        self.sheets.get(sheet).map(String::as_str)
    }

    /// Details of one sheet; a sheet without a worksheet part has none
    pub fn sheet_parts(&mut self, sheet: &str) -> DigestResult<SheetParts> {
        let Some(part) = self.sheets.get(sheet).cloned() else {
            return Ok(SheetParts::default());
        };
        let Some(xml) = read_part(&mut self.archive, &part)? else {
            return Ok(SheetParts::default());
        };
        let rels = self.relationships_of(&part)?;

        let mut parts = SheetParts {
            validations: parse_data_validations(&xml)?,
            hyperlinks: parse_hyperlinks(&xml, &rels)?,
            ..Default::default()
        };

        let dir = part_dir(&part);
        for rel in rels.values().filter(|rel| !rel.external) {
            let target = resolve_target(dir, &rel.target);
            if rel.is("comments") {
                if let Some(xml) = read_part(&mut self.archive, &target)? {
                    parts.comments.extend(parse_comments(&xml)?);
                }
            } else if rel.is("pivotTable") && parts.pivot_tables.len() < MAX_PIVOT_TABLES {
                if let Some(pivot) = self.pivot_table(&target)? {
                    parts.pivot_tables.push(pivot);
                }
            }
        }

        Ok(parts)
    }

    fn relationships_of(&mut self, part: &str) -> DigestResult<BTreeMap<String, Relationship>> {
        match read_part(&mut self.archive, &rels_path(part))? {
            Some(xml) => Ok(parse_relationships(&xml)?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn pivot_table(&mut self, part: &str) -> DigestResult<Option<PivotTableInfo>> {
        let Some(xml) = read_part(&mut self.archive, part)? else {
            return Ok(None);
        };

        // Field names live in the pivot cache definition
        let mut cache_fields = Vec::new();
        let dir = part_dir(part);
        for rel in self.relationships_of(part)?.values() {
            if rel.is("pivotCacheDefinition") {
                let target = resolve_target(dir, &rel.target);
                if let Some(cache) = read_part(&mut self.archive, &target)? {
                    cache_fields = parse_cache_field_names(&cache)?;
                }
                break;
            }
        }

        Ok(Some(parse_pivot_table(&xml, &cache_fields)?))
    }
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> DigestResult<Option<String>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut xml = String::new();
            file.read_to_string(&mut xml)?;
            Ok(Some(xml))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// `xl/worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`
fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Resolve a relationship target against the directory of its source part
fn resolve_target(base_dir: &str, target: &str) -> String {
    let (mut segments, target) = match target.strip_prefix('/') {
        Some(absolute) => (Vec::new(), absolute),
        None => (
            base_dir.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>(),
            target,
        ),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

//==============================================================================
// Part parsers
//==============================================================================

/// Attributes by local name (`r:id` → `id`), unescaped
fn attributes(element: &BytesStart<'_>) -> XmlResult<HashMap<String, String>> {
    let mut out = HashMap::new();
    for attr in element.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        out.insert(key, attr.unescape_value()?.into_owned());
    }
    Ok(out)
}

fn xml_bool(value: Option<&String>) -> bool {
    value.is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn parse_relationships(xml: &str) -> XmlResult<BTreeMap<String, Relationship>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rels = BTreeMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut attrs = attributes(&e)?;
                if let (Some(id), Some(target)) = (attrs.remove("Id"), attrs.remove("Target")) {
                    rels.insert(
                        id,
                        Relationship {
                            kind: attrs.remove("Type").unwrap_or_default(),
                            target,
                            external: attrs
                                .get("TargetMode")
                                .is_some_and(|mode| mode == "External"),
                        },
                    );
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// `(sheet name, relationship id)` in workbook order
fn parse_workbook_sheets(xml: &str) -> XmlResult<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut attrs = attributes(&e)?;
                if let (Some(name), Some(id)) = (attrs.remove("name"), attrs.remove("id")) {
                    sheets.push((name, id));
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

fn validation_rule(element: &BytesStart<'_>) -> XmlResult<Option<ValidationRule>> {
    let mut attrs = attributes(element)?;
    // `none` (the schema default) disables the rule
    let kind = match attrs.remove("type") {
        Some(kind) if kind != "none" => kind,
        _ => return Ok(None),
    };

    Ok(Some(ValidationRule {
        ranges: attrs.get("sqref").map(|s| parse_sqref(s)).unwrap_or_default(),
        kind,
        operator: attrs.remove("operator"),
        allow_blank: xml_bool(attrs.get("allowBlank")),
        show_error_message: xml_bool(attrs.get("showErrorMessage")),
        hide_drop_down: xml_bool(attrs.get("showDropDown")),
        error_title: attrs.remove("errorTitle"),
        error: attrs.remove("error"),
        prompt_title: attrs.remove("promptTitle"),
        prompt: attrs.remove("prompt"),
        ..Default::default()
    }))
}

fn parse_data_validations(xml: &str) -> XmlResult<Vec<ValidationRule>> {
    #[derive(Clone, Copy)]
    enum Formula {
        First,
        Second,
    }

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rules = Vec::new();
    let mut current: Option<ValidationRule> = None;
    let mut in_formula: Option<Formula> = None;

    fn push_text(current: &mut Option<ValidationRule>, target: Option<Formula>, text: &str) {
        let (Some(rule), Some(target)) = (current.as_mut(), target) else {
            return;
        };
        match target {
            Formula::First => rule.formula1.push_str(text),
            Formula::Second => rule.formula2.get_or_insert_with(String::new).push_str(text),
        }
    }

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => match e.local_name().as_ref() {
                b"dataValidation" => current = validation_rule(&e)?,
                b"formula1" => in_formula = Some(Formula::First),
                b"formula2" => in_formula = Some(Formula::Second),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"dataValidation" => {
                rules.extend(validation_rule(&e)?);
            }
            Event::Text(t) => push_text(&mut current, in_formula, &t.unescape()?),
            Event::CData(t) => push_text(&mut current, in_formula, &String::from_utf8_lossy(&t)),
            Event::End(e) => match e.local_name().as_ref() {
                b"formula1" | b"formula2" => in_formula = None,
                b"dataValidation" => {
                    if let Some(mut rule) = current.take() {
                        rule.formula1 = strip_equals(&rule.formula1);
                        rule.formula2 = rule.formula2.as_deref().map(strip_equals);
                        rules.push(rule);
                    }
                    in_formula = None;
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(rules)
}

fn strip_equals(formula: &str) -> String {
    let trimmed = formula.trim();
    trimmed.strip_prefix('=').unwrap_or(trimmed).to_string()
}

fn parse_hyperlinks(xml: &str, rels: &BTreeMap<String, Relationship>) -> XmlResult<Vec<Hyperlink>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut links = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"hyperlink" => {
                let mut attrs = attributes(&e)?;
                links.push(Hyperlink {
                    range: attrs.get("ref").and_then(|r| CellRange::parse(r)),
                    target: attrs
                        .get("id")
                        .and_then(|id| rels.get(id))
                        .map(|rel| rel.target.clone()),
                    location: attrs.remove("location"),
                    tooltip: attrs.remove("tooltip"),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(links)
}

fn parse_comments(xml: &str) -> XmlResult<Vec<CellComment>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut authors: Vec<String> = Vec::new();
    let mut comments = Vec::new();

    let mut in_author = false;
    let mut in_text_run = false;
    // (cell, author index, text so far)
    let mut current: Option<(CellAddress, Option<usize>, String)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => match e.local_name().as_ref() {
                b"author" => {
                    in_author = true;
                    authors.push(String::new());
                }
                b"comment" => {
                    let attrs = attributes(&e)?;
                    current = attrs
                        .get("ref")
                        .and_then(|r| r.parse::<CellAddress>().ok())
                        .map(|cell| {
                            let author = attrs.get("authorId").and_then(|a| a.parse().ok());
                            (cell, author, String::new())
                        });
                }
                b"t" => in_text_run = current.is_some(),
                _ => {}
            },
            Event::Text(t) => {
                let text = t.unescape()?;
                if in_author {
                    if let Some(author) = authors.last_mut() {
                        author.push_str(&text);
                    }
                } else if in_text_run {
                    if let Some((_, _, body)) = current.as_mut() {
                        body.push_str(&text);
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"author" => in_author = false,
                b"t" => in_text_run = false,
                b"comment" => {
                    if let Some((cell, author, text)) = current.take() {
                        comments.push(CellComment {
                            cell,
                            text: text.trim().to_string(),
                            author: author.and_then(|i| authors.get(i).cloned()),
                        });
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(comments)
}

fn parse_cache_field_names(xml: &str) -> XmlResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut names = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"cacheField" => {
                names.push(attributes(&e)?.remove("name").unwrap_or_default());
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}

fn parse_pivot_table(xml: &str, cache_fields: &[String]) -> XmlResult<PivotTableInfo> {
    #[derive(Clone, Copy, PartialEq)]
    enum Section {
        Rows,
        Columns,
    }

    // Negative indexes (`-2`) are the synthetic "Values" field
    let field_name = |index: Option<&String>| -> Option<String> {
        let index: usize = index?.parse().ok()?;
        Some(
            cache_fields
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("field{}", index)),
        )
    };

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut pivot = PivotTableInfo::default();
    let mut section: Option<Section> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let attrs = attributes(&e)?;
                match e.local_name().as_ref() {
                    b"pivotTableDefinition" => {
                        pivot.name = attrs.get("name").cloned().unwrap_or_default();
                    }
                    b"location" => pivot.location = attrs.get("ref").cloned(),
                    b"rowFields" => section = Some(Section::Rows),
                    b"colFields" => section = Some(Section::Columns),
                    b"field" => {
                        if let Some(name) = field_name(attrs.get("x")) {
                            match section {
                                Some(Section::Rows) => pivot.row_fields.push(name),
                                Some(Section::Columns) => pivot.column_fields.push(name),
                                None => {}
                            }
                        }
                    }
                    b"pageField" => pivot.page_fields.extend(field_name(attrs.get("fld"))),
                    b"dataField" => {
                        let name = attrs
                            .get("name")
                            .cloned()
                            .or_else(|| field_name(attrs.get("fld")))
                            .unwrap_or_default();
                        pivot.data_fields.push(PivotDataField {
                            name,
                            function: attrs
                                .get("subtotal")
                                .cloned()
                                .unwrap_or_else(|| "sum".to_string()),
                        });
                    }
                    _ => {}
                }
            }
            Event::End(e) if matches!(e.local_name().as_ref(), b"rowFields" | b"colFields") => {
                section = None;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(pivot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::SheetSource;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const WORKBOOK: &str = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="Report" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;

    const WORKBOOK_RELS: &str = r#"<Relationships>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;

    const SHEET_WITH_RULES: &str = r#"<worksheet xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheetData/>
  <dataValidations count="3">
    <dataValidation type="list" allowBlank="1" showErrorMessage="1" sqref="B2:B50">
      <formula1>"Open,Closed"</formula1>
    </dataValidation>
    <dataValidation type="whole" operator="between" sqref="C2:C50 E2" errorTitle="Range">
      <formula1>1</formula1>
      <formula2>10</formula2>
    </dataValidation>
    <dataValidation type="none" sqref="D2"/>
  </dataValidations>
  <hyperlinks>
    <hyperlink ref="A1" r:id="rId1" tooltip="Docs"/>
    <hyperlink ref="A2" location="Report!A1"/>
  </hyperlinks>
</worksheet>"#;

    const SHEET_RELS: &str = r#"<Relationships>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/docs" TargetMode="External"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments" Target="../comments1.xml"/>
</Relationships>"#;

    const COMMENTS: &str = r#"<comments>
  <authors><author>Dana</author></authors>
  <commentList>
    <comment ref="B2" authorId="0"><text><r><t>Dana:</t></r><r><t xml:space="preserve"> check status</t></r></text></comment>
  </commentList>
</comments>"#;

    const REPORT_RELS: &str = r#"<Relationships>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/pivotTable" Target="../pivotTables/pivotTable1.xml"/>
</Relationships>"#;

    const PIVOT: &str = r#"<pivotTableDefinition name="SalesByRegion" cacheId="1">
  <location ref="A3:C8" firstHeaderRow="1" firstDataRow="2" firstDataCol="1"/>
  <pivotFields count="3"><pivotField axis="axisRow"><items><item x="0"/></items></pivotField><pivotField dataField="1"/><pivotField axis="axisPage"/></pivotFields>
  <rowFields count="1"><field x="0"/></rowFields>
  <colFields count="1"><field x="-2"/></colFields>
  <pageFields count="1"><pageField fld="2" hier="-1"/></pageFields>
  <dataFields count="2"><dataField name="Sum of Amount" fld="1"/><dataField name="Count of Amount" fld="1" subtotal="count"/></dataFields>
</pivotTableDefinition>"#;

    const PIVOT_RELS: &str = r#"<Relationships>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/pivotCacheDefinition" Target="../pivotCache/pivotCacheDefinition1.xml"/>
</Relationships>"#;

    const CACHE: &str = r#"<pivotCacheDefinition><cacheFields count="3">
  <cacheField name="Region"><sharedItems/></cacheField>
  <cacheField name="Amount"><sharedItems/></cacheField>
  <cacheField name="Year"><sharedItems/></cacheField>
</cacheFields></pivotCacheDefinition>"#;

    fn package() -> XlsxPackage<Cursor<Vec<u8>>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let parts = [
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", SHEET_WITH_RULES),
            ("xl/worksheets/_rels/sheet1.xml.rels", SHEET_RELS),
            ("xl/comments1.xml", COMMENTS),
            ("xl/worksheets/sheet2.xml", "<worksheet><sheetData/></worksheet>"),
            ("xl/worksheets/_rels/sheet2.xml.rels", REPORT_RELS),
            ("xl/pivotTables/pivotTable1.xml", PIVOT),
            ("xl/pivotTables/_rels/pivotTable1.xml.rels", PIVOT_RELS),
            ("xl/pivotCache/pivotCacheDefinition1.xml", CACHE),
        ];
        for (name, xml) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }
        let cursor = zip.finish().unwrap();
        XlsxPackage::from_reader(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl/worksheets", "../comments1.xml"), "xl/comments1.xml");
        assert_eq!(resolve_target("xl", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(rels_path("xl/worksheets/sheet1.xml"), "xl/worksheets/_rels/sheet1.xml.rels");
    }

    #[test]
    fn test_cell_range() {
        let range = CellRange::parse("$B$2:D10").unwrap();
        assert!(range.contains(2, 2));
        assert!(range.contains(10, 4));
        assert!(!range.contains(11, 4));
        assert!(CellRange::parse("A:A").is_none());
        assert_eq!(parse_sqref("A1 C3:C4").len(), 2);
    }

    #[test]
    fn test_sheet_mapping() {
        let package = package();
        assert_eq!(package.sheet_part("Data"), Some("xl/worksheets/sheet1.xml"));
        assert_eq!(package.sheet_part("Report"), Some("xl/worksheets/sheet2.xml"));
        assert_eq!(package.sheet_part("Missing"), None);
    }

    #[test]
    fn test_data_validations() {
        let rules = parse_data_validations(SHEET_WITH_RULES).unwrap();
        assert_eq!(rules.len(), 2);

        let list = &rules[0];
        assert_eq!(list.kind, "list");
        assert_eq!(list.formula1, "\"Open,Closed\"");
        assert!(list.allow_blank);
        assert!(list.covers(30, 2));
        assert_eq!(
            list.to_context_json("B2"),
            json!({
                "cell": "B2",
                "type": "list",
                "formula1": "\"Open,Closed\"",
                "dropdown": true,
                "values": ["Open", "Closed"]
            })
        );

        let whole = &rules[1];
        assert_eq!(whole.operator.as_deref(), Some("between"));
        assert_eq!(whole.formula2.as_deref(), Some("10"));
        assert!(whole.covers(2, 5));
        assert_eq!(whole.to_cell_json()["error_title"], "Range");
    }

    #[test]
    fn test_sheet_parts() {
        let mut package = package();
        let parts = package.sheet_parts("Data").unwrap();

        assert_eq!(parts.validations.len(), 2);
        assert_eq!(parts.hyperlinks.len(), 2);
        assert_eq!(
            parts.hyperlinks[0].target.as_deref(),
            Some("https://example.com/docs")
        );
        assert_eq!(parts.hyperlinks[1].location.as_deref(), Some("Report!A1"));
        assert_eq!(
            parts.comments,
            vec![CellComment {
                cell: CellAddress::new(2, 2),
                text: "Dana: check status".to_string(),
                author: Some("Dana".to_string()),
            }]
        );
        assert!(parts.pivot_tables.is_empty());
    }

    #[test]
    fn test_pivot_tables() {
        let mut package = package();
        let parts = package.sheet_parts("Report").unwrap();

        assert_eq!(parts.pivot_tables.len(), 1);
        let pivot = &parts.pivot_tables[0];
        assert_eq!(pivot.name, "SalesByRegion");
        assert_eq!(pivot.location.as_deref(), Some("A3:C8"));
        assert_eq!(pivot.row_fields, vec!["Region".to_string()]);
        assert!(pivot.column_fields.is_empty());
        assert_eq!(pivot.page_fields, vec!["Year".to_string()]);
        assert_eq!(pivot.data_fields[0].function, "sum");
        assert_eq!(pivot.data_fields[1].function, "count");

        let rendered = pivot.to_json();
        assert_eq!(rendered["fields"]["row_fields"], json!([{"name": "Region"}]));
        assert!(rendered["fields"].get("column_fields").is_none());
    }

    #[test]
    fn test_apply_to_sheet() {
        let mut package = package();
        let parts = package.sheet_parts("Data").unwrap();

        let mut sheet = MemorySheet::new("Data");
        sheet.set_value(1, 1, "Docs");
        sheet.set_value(2, 2, "Open");
        sheet.set_value(2, 3, 5);
        sheet.set_value(2, 4, "plain");
        parts.apply_to(&mut sheet);

        let status = sheet.cell(2, 2).unwrap();
        assert_eq!(status.data_validation.as_ref().unwrap()["type"], "list");
        assert_eq!(status.comment.as_ref().unwrap()["author"], "Dana");
        assert_eq!(
            sheet.cell(1, 1).unwrap().hyperlink,
            Some(json!({"target": "https://example.com/docs", "tooltip": "Docs"}))
        );
        assert_eq!(sheet.cell(2, 3).unwrap().data_validation.as_ref().unwrap()["type"], "whole");
        assert!(sheet.cell(2, 4).unwrap().data_validation.is_none());
        assert_eq!(sheet.validations().len(), 2);
    }
}
