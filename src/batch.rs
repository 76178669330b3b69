//! Batch discovery and parallel conversion

use crate::converter::{convert_workbook, write_workbook_json, ConvertOptions, OutputOptions, WrittenDocument};
use crate::error::{DigestError, DigestResult};
use crate::workbook::is_supported;
use globset::GlobBuilder;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Expand files, directories (recursively) and glob patterns into the
/// supported spreadsheets they name, without duplicates, in argument order
pub fn find_spreadsheets<S: AsRef<str>>(inputs: &[S]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        let path = Path::new(input);

        let found = if path.is_dir() {
            walk_spreadsheets(path)
        } else if path.is_file() {
            if is_supported(path) {
                vec![path.to_path_buf()]
            } else {
                tracing::warn!("Skipping unsupported file {}", path.display());
                Vec::new()
            }
        } else {
            glob_spreadsheets(input)
        };

        for file in found {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }

    files
}

fn walk_spreadsheets(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_supported(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn glob_spreadsheets(pattern: &str) -> Vec<PathBuf> {
    let matcher = match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            tracing::warn!("Invalid pattern {}: {}", pattern, e);
            return Vec::new();
        }
    };

    let base = literal_base(pattern);
    let implicit_base = base.as_os_str().is_empty();
    let root = if implicit_base {
        PathBuf::from(".")
    } else {
        base
    };
    if !root.is_dir() {
        return Vec::new();
    }

    WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let path = e.path();
            if implicit_base {
                path.strip_prefix(".").unwrap_or(path).to_path_buf()
            } else {
                path.to_path_buf()
            }
        })
        .filter(|path| matcher.is_match(path) && is_supported(path))
        .collect()
}

/// Leading directories of a glob pattern that contain no wildcard
fn literal_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = pattern.split('/').collect();
    let mut base = PathBuf::new();

    for (i, part) in parts[..parts.len().saturating_sub(1)].iter().enumerate() {
        if part.contains(['*', '?', '[', '{']) {
            break;
        }
        if part.is_empty() {
            if i == 0 {
                base.push("/");
            }
            continue;
        }
        base.push(part);
    }

    base
}

/// Result of converting one file
#[derive(Debug)]
pub struct BatchOutcome {
    pub source: PathBuf,
    pub result: DigestResult<WrittenDocument>,
    pub elapsed: Duration,
}

/// All outcomes of a batch, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = (&Path, &WrittenDocument)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|w| (o.source.as_path(), w)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &DigestError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.source.as_path(), e)))
    }

    pub fn succeeded(&self) -> usize {
        self.successes().count()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Mean token count over successful conversions
    pub fn average_tokens(&self) -> Option<f64> {
        let tokens: Vec<usize> = self.successes().map(|(_, w)| w.token_count).collect();
        if tokens.is_empty() {
            return None;
        }
        Some(tokens.iter().sum::<usize>() as f64 / tokens.len() as f64)
    }

    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.successes().map(|(_, w)| w.path.clone()).collect()
    }
}

/// Convert and write one workbook
pub fn convert_file(
    path: &Path,
    convert: &ConvertOptions,
    output: &OutputOptions,
) -> DigestResult<WrittenDocument> {
    let mut document = convert_workbook(path, convert)?;
    write_workbook_json(&mut document, path, output)
}

/// Convert `files` on a pool of `jobs` worker threads.
///
/// A failing workbook is recorded in the report and does not stop the
/// others. The report is assembled after every job has finished.
pub fn convert_batch(
    files: &[PathBuf],
    convert: &ConvertOptions,
    output: &OutputOptions,
    jobs: usize,
) -> DigestResult<BatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .map_err(|e| DigestError::Config(format!("Failed to start worker pool: {}", e)))?;

    tracing::info!("Converting {} workbooks on {} threads", files.len(), jobs.max(1));
    let started = Instant::now();

    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let file_started = Instant::now();
                let result = convert_file(path, convert, output);
                if let Err(e) = &result {
                    tracing::warn!(file = %path.display(), "Conversion failed: {}", e);
                }
                BatchOutcome {
                    source: path.clone(),
                    result,
                    elapsed: file_started.elapsed(),
                }
            })
            .collect()
    });

    Ok(BatchReport {
        outcomes,
        elapsed: started.elapsed(),
    })
}

/// How a token count fits common LLM context windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFit {
    /// Fits a window of this many tokens
    Fits(usize),
    /// Larger than every listed window
    TooLarge,
}

impl ContextFit {
    pub fn message(&self) -> String {
        match self {
            ContextFit::Fits(window) => {
                format!("Fits a {}K-token context window", window / 1000)
            }
            ContextFit::TooLarge => "Large token count. Consider splitting the data or using a model with a larger context window".to_string(),
        }
    }
}

/// Smallest common context window (4K, 8K, 16K, 32K) that holds `tokens`
pub fn llm_recommendation(tokens: f64) -> ContextFit {
    [4000, 8000, 16000, 32000]
        .into_iter()
        .find(|window| tokens < *window as f64)
        .map(ContextFit::Fits)
        .unwrap_or(ContextFit::TooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_literal_base() {
        assert_eq!(literal_base("*.xlsx"), PathBuf::new());
        assert_eq!(literal_base("data/*.xlsx"), PathBuf::from("data"));
        assert_eq!(literal_base("data/2024/**/*.xls"), PathBuf::from("data/2024"));
        assert_eq!(literal_base("/srv/in/*.xlsx"), PathBuf::from("/srv/in"));
    }

    #[test]
    fn test_directory_walk_is_recursive_and_filtered() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.xlsx"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/b.xls"));
        touch(&dir.path().join("nested/deeper/c.XLSM"));

        let found = find_spreadsheets(&[dir.path().to_string_lossy().into_owned()]);
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.xlsx", "b.xls", "c.XLSM"]);
    }

    #[test]
    fn test_glob_patterns() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("q1.xlsx"));
        touch(&dir.path().join("q2.xlsx"));
        touch(&dir.path().join("sub/q3.xlsx"));

        let pattern = format!("{}/q*.xlsx", dir.path().display());
        let found = find_spreadsheets(&[pattern]);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.parent() == Some(dir.path())));
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("one.xlsx");
        touch(&file);

        let arg = file.to_string_lossy().into_owned();
        let found = find_spreadsheets(&[arg.clone(), dir.path().to_string_lossy().into_owned(), arg]);
        assert_eq!(found, vec![file]);
    }

    #[test]
    fn test_nothing_found() {
        let found = find_spreadsheets(&["/definitely/not/here/*.xlsx"]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_batch_records_failures() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("broken.xlsx");
        fs::write(&broken, "not a workbook").unwrap();
        let missing = dir.path().join("missing.xlsx");

        let output = OutputOptions {
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        let report =
            convert_batch(&[broken, missing], &ConvertOptions::default(), &output, 2).unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.average_tokens(), None);
    }

    #[test]
    fn test_llm_recommendation() {
        assert_eq!(llm_recommendation(100.0), ContextFit::Fits(4000));
        assert_eq!(llm_recommendation(4000.0), ContextFit::Fits(8000));
        assert_eq!(llm_recommendation(31_999.0), ContextFit::Fits(32000));
        assert_eq!(llm_recommendation(32_000.0), ContextFit::TooLarge);
        assert_eq!(ContextFit::Fits(16000).message(), "Fits a 16K-token context window");
    }
}
