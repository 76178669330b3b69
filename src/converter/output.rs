//! Writing converted documents to disk

use crate::error::DigestResult;
use crate::schema::{encode, estimate_tokens, KeyMode};
use crate::types::{DocumentMetadata, WorkbookDocument};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Where and how documents are written
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub output_dir: PathBuf,
    pub key_mode: KeyMode,
    pub minify: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("converted_json"),
            key_mode: KeyMode::Abbreviated,
            minify: false,
        }
    }
}

/// A document on disk
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenDocument {
    pub path: PathBuf,
    pub token_count: usize,
}

/// Local time as `YYYYmmdd_HHMMSS`
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `{base}[_efficient]_{tokens}tokens_{timestamp}.json`
pub fn output_file_name(base: &str, key_mode: KeyMode, tokens: usize, timestamp: &str) -> String {
    let suffix = if key_mode.is_abbreviated() {
        "_efficient"
    } else {
        ""
    };
    format!("{}{}_{}tokens_{}.json", base, suffix, tokens, timestamp)
}

/// Serialize `value` to `path`, 2-space indented unless minified
pub fn write_json(value: &Value, path: &Path, minify: bool) -> DigestResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let text = if minify {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    fs::write(path, text)?;
    Ok(())
}

/// Stamp metadata on `document` and write it under the output directory.
///
/// The token count covers the encoded document as it was before the
/// metadata block was added.
pub fn write_workbook_json(
    document: &mut WorkbookDocument,
    source: &Path,
    options: &OutputOptions,
) -> DigestResult<WrittenDocument> {
    let token_count = estimate_tokens(&encode(serde_json::to_value(&*document)?, options.key_mode));
    let stamp = timestamp();

    let original_filename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| document.file_name.clone());
    let base = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());

    document.metadata = Some(DocumentMetadata {
        token_count,
        conversion_timestamp: stamp.clone(),
        original_filename: Some(original_filename),
        key_mode: Some(options.key_mode),
    });

    let path = options
        .output_dir
        .join(output_file_name(&base, options.key_mode, token_count, &stamp));
    let encoded = encode(serde_json::to_value(&*document)?, options.key_mode);
    write_json(&encoded, &path, options.minify)?;

    tracing::info!(
        output = %path.display(),
        tokens = token_count,
        "Saved workbook JSON"
    );

    Ok(WrittenDocument { path, token_count })
}
