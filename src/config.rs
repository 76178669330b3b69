//! Conversion settings, from a YAML file and command-line overrides

use crate::converter::{ConvertOptions, OutputOptions};
use crate::error::{DigestError, DigestResult};
use crate::sampling::SamplingOptions;
use crate::schema::KeyMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output directory for converted workbooks
pub const DEFAULT_OUTPUT_DIR: &str = "converted_json";
/// Output directory for consolidated documents
pub const DEFAULT_CONSOLIDATED_DIR: &str = "consolidated_json";

/// Intelligent sampling section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub enabled: bool,
    pub base_rate: u32,
    pub aggressive: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let defaults = SamplingOptions::default();
        Self {
            enabled: false,
            base_rate: defaults.base_rate,
            aggressive: defaults.aggressive,
        }
    }
}

/// Everything a run can be configured with.
///
/// ```yaml
/// output_dir: out
/// rows: 200
/// minify: true
/// sampling:
///   enabled: true
///   base_rate: 20
/// jobs: 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output_dir: Option<PathBuf>,
    /// Row cap per sheet when not sampling
    pub rows: Option<u32>,
    pub formulas_only: bool,
    pub keep_formatting: bool,
    pub minify: bool,
    pub full_names: bool,
    pub no_context: bool,
    pub sampling: SamplingConfig,
    /// Worker threads for batch conversion
    pub jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: None,
            rows: None,
            formulas_only: false,
            keep_formatting: false,
            minify: false,
            full_names: false,
            no_context: false,
            sampling: SamplingConfig::default(),
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub output_dir: Option<PathBuf>,
    pub rows: Option<u32>,
    pub formulas_only: Option<bool>,
    pub keep_formatting: Option<bool>,
    pub minify: Option<bool>,
    pub full_names: Option<bool>,
    pub no_context: Option<bool>,
    pub sampling: Option<bool>,
    pub base_rate: Option<u32>,
    pub aggressive: Option<bool>,
    pub jobs: Option<usize>,
}

impl Config {
    /// Read and validate a YAML config file
    pub fn load(path: &Path) -> DigestResult<Self> {
        if !path.exists() {
            return Err(DigestError::InputNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(config = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// `path` when given, otherwise the defaults
    pub fn load_or_default(path: Option<&Path>) -> DigestResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = Some(dir.clone());
        }
        if let Some(rows) = overrides.rows {
            self.rows = Some(rows);
        }
        set(&mut self.formulas_only, overrides.formulas_only);
        set(&mut self.keep_formatting, overrides.keep_formatting);
        set(&mut self.minify, overrides.minify);
        set(&mut self.full_names, overrides.full_names);
        set(&mut self.no_context, overrides.no_context);
        set(&mut self.sampling.enabled, overrides.sampling);
        set(&mut self.sampling.base_rate, overrides.base_rate);
        set(&mut self.sampling.aggressive, overrides.aggressive);
        set(&mut self.jobs, overrides.jobs);
    }

    pub fn validate(&self) -> DigestResult<()> {
        if self.sampling.base_rate < 1 {
            return Err(DigestError::Config(
                "sampling.base_rate must be at least 1".to_string(),
            ));
        }
        if self.jobs < 1 {
            return Err(DigestError::Config("jobs must be at least 1".to_string()));
        }
        if self.rows == Some(0) {
            return Err(DigestError::Config("rows must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn key_mode(&self) -> KeyMode {
        KeyMode::from_full_names(self.full_names)
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            row_limit: self.rows,
            formulas_only: self.formulas_only,
            keep_formatting: self.keep_formatting,
            include_context: !self.no_context,
            sampling: self.sampling.enabled.then_some(SamplingOptions {
                base_rate: self.sampling.base_rate,
                aggressive: self.sampling.aggressive,
            }),
        }
    }

    /// Output settings, writing to `default_dir` unless a directory is set
    pub fn output_options(&self, default_dir: &str) -> OutputOptions {
        OutputOptions {
            output_dir: self
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_dir)),
            key_mode: self.key_mode(),
            minify: self.minify,
        }
    }
}

fn set<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}
