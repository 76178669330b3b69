use std::path::PathBuf;
use thiserror::Error;

pub type DigestResult<T> = Result<T, DigestError>;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Unsupported file format: {} (supported: .xlsx, .xls, .xlsm)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Failed to load spreadsheet {}: {reason}", path.display())]
    LoadFailure { path: PathBuf, reason: String },

    #[error("Package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed workbook package: {0}")]
    Package(String),

    #[error("No sheets could be extracted from {}", .0.display())]
    NoSheets(PathBuf),

    #[error("Invalid workbook document {}: {reason}", path.display())]
    Document { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Nothing to process: {0}")]
    NoInputs(String),
}
