//! Formula-preserving row sampling

use super::classifier::{classify, RowClassification};
use crate::workbook::SheetSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sampling knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOptions {
    /// Interval between kept interior rows of a repeated pattern
    pub base_rate: u32,
    /// Scale the rate with sheet size
    pub aggressive: bool,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            base_rate: 10,
            aggressive: true,
        }
    }
}

/// Sheet-level sampling rate for a sheet of `row_count` rows (never below 1)
pub fn sampling_rate(row_count: u32, options: &SamplingOptions) -> u32 {
    let base = options.base_rate.max(1);
    if !options.aggressive {
        return base;
    }
    match row_count {
        r if r < 100 => 2,
        r if r < 500 => base,
        r if r < 1000 => base.saturating_mul(2),
        r if r < 5000 => base.saturating_mul(5),
        _ => base.saturating_mul(10),
    }
}

/// Rows kept for one sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledRowSet {
    rows: BTreeSet<u32>,
    total_rows: u32,
    rate: u32,
}

impl SampledRowSet {
    /// Every row `1..=limit` of a sheet with `total_rows` rows, unsampled
    pub fn leading(total_rows: u32, limit: Option<u32>) -> Self {
        let last = limit.map_or(total_rows, |limit| limit.min(total_rows));
        Self {
            rows: (1..=last).collect(),
            total_rows,
            rate: 1,
        }
    }

    pub fn rows(&self) -> &BTreeSet<u32> {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.iter().copied()
    }

    pub fn contains(&self, row: u32) -> bool {
        self.rows.contains(&row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_rows(&self) -> u32 {
        self.total_rows
    }

    /// Sheet-level rate the set was sampled with
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Fraction of rows dropped, `(R - kept) / R`; 0 for an empty sheet
    pub fn reduction(&self) -> f64 {
        if self.total_rows == 0 {
            return 0.0;
        }
        let kept = self.rows.len() as f64;
        (self.total_rows as f64 - kept) / self.total_rows as f64
    }
}

/// Sample `sheet`, keeping every distinct formula shape and the boundary
/// rows of each group
pub fn sample(sheet: &dyn SheetSource, options: &SamplingOptions) -> SampledRowSet {
    let classification = classify(sheet);
    let sampled = select_rows(&classification, sheet.row_count(), options);

    tracing::info!(
        sheet = sheet.name(),
        "Sampled {}/{} rows ({:.1}% reduction, {} formula patterns)",
        sampled.len(),
        sampled.total_rows(),
        sampled.reduction() * 100.0,
        classification.pattern_count()
    );

    sampled
}

/// Choose rows from an existing classification
pub fn select_rows(
    classification: &RowClassification,
    row_count: u32,
    options: &SamplingOptions,
) -> SampledRowSet {
    if row_count == 0 {
        return SampledRowSet::default();
    }

    let rate = sampling_rate(row_count, options);
    let mut kept: BTreeSet<u32> = BTreeSet::new();

    // Never dropped
    kept.extend(&classification.header_rows);
    kept.extend(&classification.footer_rows);
    kept.extend(&classification.unique_formula_rows);

    for rows in classification.pattern_to_rows.values() {
        if rows.len() <= 2 {
            kept.extend(rows);
            continue;
        }
        let group_rate = if rows.len() > 100 {
            rate.saturating_mul(2)
        } else {
            rate
        };
        keep_group(&mut kept, rows, group_rate);
    }

    let raw_rate = rate.saturating_mul(2);
    if !classification.raw_data_rows.is_empty() {
        keep_group(&mut kept, &classification.raw_data_rows, raw_rate);
    }

    // Too little left: densify at half the raw-data rate
    let floor = (row_count as f64 / 10.0).min(50.0);
    if (kept.len() as f64) < floor {
        let step = (raw_rate / 2).max(1);
        kept.extend((1..=row_count).filter(|row| row % step == 0));
    }

    SampledRowSet {
        rows: kept,
        total_rows: row_count,
        rate,
    }
}

/// Keep the first and last row of a sorted group plus every interior row
/// whose 1-based interior index is a multiple of `rate`
fn keep_group(kept: &mut BTreeSet<u32>, rows: &BTreeSet<u32>, rate: u32) {
    let (Some(&first), Some(&last)) = (rows.first(), rows.last()) else {
        return;
    };
    kept.insert(first);
    kept.insert(last);

    let rate = rate.max(1) as usize;
    let interior = rows.len().saturating_sub(2);
    kept.extend(
        rows.iter()
            .skip(1)
            .take(interior)
            .enumerate()
            .filter(|(i, _)| (i + 1) % rate == 0)
            .map(|(_, row)| *row),
    );
}
