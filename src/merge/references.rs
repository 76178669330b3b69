//! Cross-workbook references: `[Book.xlsx]Sheet!A1`
//!
//! Resolution happens in two stages. A [`ReferenceCollector`] visits every
//! document and records raw targets; only once every workbook id is known
//! does [`CollectedReferences::resolve`] map target file names to ids.

use super::WorkbookId;
use crate::types::WorkbookDocument;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

fn cross_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\]]+)\]([^!\[\]]+)!\$?([A-Z]+)\$?([0-9]+)")
            .expect("cross-workbook reference regex must compile")
    })
}

/// A cell addressed by workbook, sheet and address.
///
/// `workbook` is a workbook id once resolved, or the raw file name when the
/// target workbook was not part of the merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetCellRef {
    pub workbook: String,
    pub sheet: String,
    pub cell: String,
}

impl fmt::Display for SheetCellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.workbook, self.sheet, self.cell)
    }
}

/// A reference target still naming its workbook by file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRef {
    pub file_name: String,
    pub sheet: String,
    pub cell: String,
}

/// Every cross-workbook reference in a formula, in order of appearance
pub fn find_references(formula: &str) -> Vec<UnresolvedRef> {
    cross_ref_re()
        .captures_iter(formula)
        .map(|caps| UnresolvedRef {
            file_name: caps[1].to_string(),
            sheet: caps[2].trim_end_matches('\'').to_string(),
            cell: format!("{}{}", &caps[3], &caps[4]),
        })
        .collect()
}

/// File name → workbook id, complete once every document has been visited
#[derive(Debug, Clone, Default)]
pub struct WorkbookIdTable {
    ids: HashMap<String, WorkbookId>,
}

impl WorkbookIdTable {
    pub fn insert(&mut self, file_name: impl Into<String>, id: WorkbookId) {
        self.ids.insert(file_name.into(), id);
    }

    pub fn get(&self, file_name: &str) -> Option<&WorkbookId> {
        self.ids.get(file_name)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// First stage: scan formula cells
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    references: BTreeMap<SheetCellRef, Vec<UnresolvedRef>>,
}

impl ReferenceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the references found in `document`; returns how many
    pub fn collect(&mut self, id: &WorkbookId, document: &WorkbookDocument) -> usize {
        let mut found = 0;
        for (sheet_name, sheet) in &document.sheets {
            for (address, formula) in sheet.formulas() {
                let targets = find_references(formula);
                if targets.is_empty() {
                    continue;
                }
                found += targets.len();
                let source = SheetCellRef {
                    workbook: id.to_string(),
                    sheet: sheet_name.clone(),
                    cell: address.to_string(),
                };
                self.references.entry(source).or_default().extend(targets);
            }
        }
        found
    }

    pub fn finish(self) -> CollectedReferences {
        CollectedReferences {
            references: self.references,
        }
    }
}

/// Second stage input: all references of the merge, not yet resolved
#[derive(Debug, Default)]
pub struct CollectedReferences {
    references: BTreeMap<SheetCellRef, Vec<UnresolvedRef>>,
}

impl CollectedReferences {
    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Rewrite targets whose workbook is in `ids`; others keep the file name
    pub fn resolve(self, ids: &WorkbookIdTable) -> BTreeMap<SheetCellRef, Vec<SheetCellRef>> {
        self.references
            .into_iter()
            .map(|(source, targets)| {
                let resolved = targets
                    .into_iter()
                    .map(|target| {
                        let workbook = match ids.get(&target.file_name) {
                            Some(id) => id.to_string(),
                            None => {
                                tracing::debug!(
                                    source = %source,
                                    workbook = %target.file_name,
                                    "Reference target is outside this merge"
                                );
                                target.file_name
                            }
                        };
                        SheetCellRef {
                            workbook,
                            sheet: target.sheet,
                            cell: target.cell,
                        }
                    })
                    .collect();
                (source, resolved)
            })
            .collect()
    }
}

/// Render resolved references as `{workbook}_{sheet}_{cell}` strings.
///
/// Distinct references can render alike when names contain `_`; their
/// target lists are then joined rather than one replacing the other.
pub fn render_references(
    resolved: BTreeMap<SheetCellRef, Vec<SheetCellRef>>,
) -> BTreeMap<String, Vec<String>> {
    let mut rendered: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (source, targets) in resolved {
        let key = source.to_string();
        let entry = rendered.entry(key).or_default();
        if !entry.is_empty() {
            tracing::debug!(source = %source, "Joining references that render to the same key");
        }
        entry.extend(targets.iter().map(|target| target.to_string()));
    }
    rendered
}
