//! sheetdigest - spreadsheets to compact, LLM-friendly JSON
//!
//! Converts `.xlsx`/`.xlsm`/`.xls` workbooks into JSON documents that keep
//! every formula, and merges converted workbooks into one consolidated
//! document with cross-workbook references resolved.
//!
//! # Features
//!
//! - Formula-preserving sampling: every distinct formula shape survives
//! - Abbreviated property names to save tokens
//! - Token estimates for choosing an LLM context window
//! - Parallel batch conversion
//! - Cross-workbook merge with deterministic workbook ids
//!
//! # Example
//!
//! ```no_run
//! use sheetdigest::converter::{convert_workbook, write_workbook_json, ConvertOptions, OutputOptions};
//! use sheetdigest::sampling::SamplingOptions;
//! use std::path::Path;
//!
//! let path = Path::new("Budget.xlsx");
//! let options = ConvertOptions {
//!     sampling: Some(SamplingOptions::default()),
//!     ..Default::default()
//! };
//! let mut document = convert_workbook(path, &options)?;
//! let written = write_workbook_json(&mut document, path, &OutputOptions::default())?;
//!
//! println!("{} tokens in {}", written.token_count, written.path.display());
//! # Ok::<(), sheetdigest::error::DigestError>(())
//! ```

pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod merge;
pub mod sampling;
pub mod schema;
pub mod types;
pub mod workbook;

// Re-export commonly used types
pub use error::{DigestError, DigestResult};
pub use schema::KeyMode;
pub use types::{ConsolidatedDocument, WorkbookDocument};
