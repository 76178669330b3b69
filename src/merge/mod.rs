//! Merging converted workbook documents into one consolidated document

mod references;
mod workbook_id;

pub use references::{
    find_references, render_references, CollectedReferences, ReferenceCollector, SheetCellRef,
    UnresolvedRef, WorkbookIdTable,
};
pub use workbook_id::WorkbookId;

use crate::converter::{timestamp, write_json};
use crate::error::{DigestError, DigestResult};
use crate::schema::{decode, detect_mode, encode, estimate_tokens, validate_workbook_document, KeyMode};
use crate::types::{
    ConsolidatedDocument, ConsolidatedMetadata, EnrichedContext, WorkbookDocument, WorkbookEntry,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Builds a [`ConsolidatedDocument`] from documents added one at a time.
///
/// Documents are held until [`finish`](Self::finish), which collects
/// cross-workbook references from every document and resolves them once
/// all workbook ids are known. A document whose id is already taken
/// replaces the earlier one entirely.
#[derive(Debug)]
pub struct CrossWorkbookMerger {
    key_mode: KeyMode,
    documents: Vec<(WorkbookId, WorkbookDocument)>,
}

impl CrossWorkbookMerger {
    pub fn new(key_mode: KeyMode) -> Self {
        Self {
            key_mode,
            documents: Vec::new(),
        }
    }

    /// Add one document; returns the id it was filed under
    pub fn add(&mut self, document: WorkbookDocument) -> WorkbookId {
        let file_name = workbook_file_name(&document);
        let id = WorkbookId::from_file_name(&file_name);
        tracing::debug!(workbook = %file_name, id = %id, "Merging workbook");

        if let Some(pos) = self.documents.iter().position(|(existing, _)| existing == &id) {
            tracing::warn!(
                workbook = %file_name,
                id = %id,
                "Another workbook with the same name was already merged; replacing it"
            );
            self.documents.remove(pos);
        }

        self.documents.push((id.clone(), document));
        id
    }

    /// Number of workbooks that will be in the consolidated document
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Resolve references and stamp metadata
    pub fn finish(self) -> ConsolidatedDocument {
        let mut ids = WorkbookIdTable::default();
        for (id, document) in &self.documents {
            ids.insert(workbook_file_name(document), id.clone());
        }

        let mut collector = ReferenceCollector::new();
        let mut context = EnrichedContext::default();
        let mut workbooks = BTreeMap::new();

        for (id, document) in self.documents {
            collector.collect(&id, &document);
            if let Some(workbook_context) = &document.enriched_context {
                merge_context(&mut context, &id, workbook_context);
            }
            workbooks.insert(
                id.to_string(),
                WorkbookEntry {
                    file_name: workbook_file_name(&document),
                    sheets: document.sheets,
                    named_ranges: document.named_ranges,
                },
            );
        }

        let cross_references = render_references(collector.finish().resolve(&ids));

        let mut document = ConsolidatedDocument {
            metadata: ConsolidatedMetadata {
                workbook_count: workbooks.len(),
                conversion_timestamp: timestamp(),
                token_count: 0,
                key_mode: Some(self.key_mode),
            },
            workbooks,
            cross_references,
            enriched_context: context,
        };
        document.metadata.token_count = consolidated_tokens(&document, self.key_mode);

        tracing::info!(
            workbooks = document.metadata.workbook_count,
            references = document.cross_references.len(),
            tokens = document.metadata.token_count,
            "Merged workbooks"
        );
        document
    }
}

fn workbook_file_name(document: &WorkbookDocument) -> String {
    document
        .original_filename()
        .unwrap_or("workbook")
        .to_string()
}

fn merge_context(target: &mut EnrichedContext, id: &WorkbookId, context: &EnrichedContext) {
    for (name, table) in &context.tables {
        target
            .tables
            .insert(format!("{}_{}", id, name), table.clone());
    }
    for (name, pattern) in &context.formula_patterns {
        target
            .formula_patterns
            .insert(format!("{}_{}", id, name), pattern.clone());
    }
    for (sheet, rules) in &context.validation {
        target
            .validation
            .insert(format!("{}_{}", id, sheet), rules.clone());
    }
    for (sheet, pivots) in &context.pivot_tables {
        target
            .pivot_tables
            .insert(format!("{}_{}", id, sheet), pivots.clone());
    }
    union_last_wins(&mut target.column_types, &context.column_types, "column type");
    union_last_wins(
        &mut target.implementation_notes,
        &context.implementation_notes,
        "implementation note",
    );
}

fn union_last_wins(
    target: &mut BTreeMap<String, String>,
    source: &BTreeMap<String, String>,
    what: &str,
) {
    for (key, value) in source {
        if let Some(previous) = target.insert(key.clone(), value.clone()) {
            if &previous != value {
                tracing::debug!(key = %key, "Overwriting {} {:?} with {:?}", what, previous, value);
            }
        }
    }
}

fn consolidated_tokens(document: &ConsolidatedDocument, key_mode: KeyMode) -> usize {
    match serde_json::to_value(document) {
        Ok(value) => estimate_tokens(&encode(value, key_mode)),
        Err(e) => {
            tracing::warn!("Could not estimate tokens: {}", e);
            0
        }
    }
}

/// Merge already-loaded documents
pub fn merge(documents: Vec<WorkbookDocument>, key_mode: KeyMode) -> ConsolidatedDocument {
    let mut merger = CrossWorkbookMerger::new(key_mode);
    for document in documents {
        merger.add(document);
    }
    merger.finish()
}

/// Which input files made it into a merge
#[derive(Debug, Default)]
pub struct MergeReport {
    pub merged: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, DigestError)>,
}

/// Read a converted workbook document in either key mode
pub fn load_document(path: &Path) -> DigestResult<WorkbookDocument> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DigestError::InputNotFound(path.to_path_buf()),
        _ => DigestError::Io(e),
    })?;
    let raw: Value = serde_json::from_str(&text).map_err(|e| DigestError::Document {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let canonical = match detect_mode(&raw) {
        KeyMode::Abbreviated => decode(raw),
        KeyMode::Full => raw,
    };
    validate_workbook_document(path, &canonical)?;

    let mut document: WorkbookDocument =
        serde_json::from_value(canonical).map_err(|e| DigestError::Document {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if document.original_filename().is_none() {
        document.file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    Ok(document)
}

/// Load and merge `paths`.
///
/// A file that cannot be read is logged, recorded in the report and left
/// out; the rest are still merged.
pub fn merge_files(paths: &[PathBuf], key_mode: KeyMode) -> (ConsolidatedDocument, MergeReport) {
    let mut merger = CrossWorkbookMerger::new(key_mode);
    let mut report = MergeReport::default();

    for path in paths {
        match load_document(path) {
            Ok(document) => {
                merger.add(document);
                report.merged.push(path.clone());
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), "Skipping document: {}", e);
                report.failed.push((path.clone(), e));
            }
        }
    }

    (merger.finish(), report)
}

/// `consolidated_{N}workbooks_{tokens}tokens_{timestamp}.json`
pub fn consolidated_file_name(workbooks: usize, tokens: usize, timestamp: &str) -> String {
    format!(
        "consolidated_{}workbooks_{}tokens_{}.json",
        workbooks, tokens, timestamp
    )
}

/// Write `document` under `output_dir` with the key mode it was built for
pub fn write_consolidated_json(
    document: &ConsolidatedDocument,
    output_dir: &Path,
    minify: bool,
) -> DigestResult<PathBuf> {
    let key_mode = document.metadata.key_mode.unwrap_or_default();
    let path = output_dir.join(consolidated_file_name(
        document.metadata.workbook_count,
        document.metadata.token_count,
        &timestamp(),
    ));
    let encoded = encode(serde_json::to_value(document)?, key_mode);
    write_json(&encoded, &path, minify)?;
    tracing::info!(output = %path.display(), "Saved consolidated JSON");
    Ok(path)
}
