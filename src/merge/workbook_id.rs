//! Deterministic workbook identifiers

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// `{first 8 alphanumerics of the base name}_{6 hex chars of its MD5}`.
///
/// Derived only from the file name, so the same workbook gets the same id
/// in every merge run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkbookId(String);

impl WorkbookId {
    pub fn from_file_name(file_name: &str) -> Self {
        let base = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut hasher = Md5::new();
        hasher.update(base.as_bytes());
        let digest = hasher.finalize();
        let hash: String = digest.iter().map(|b| format!("{:02x}", b)).collect();

        let clean: String = base
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect();

        WorkbookId(format!("{}_{}", clean, &hash[..6]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkbookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
