//! Formula-aware row sampling
//!
//! Rows are classified by the row-relative shape of their formulas, then
//! sampled so every shape survives along with the first and last row of
//! each repeated group.

mod classifier;
mod normalizer;
mod sampler;

pub use classifier::{classify, RowClassification, BOUNDARY_ROWS};
pub use normalizer::normalize_formula;
pub use sampler::{sample, sampling_rate, select_rows, SampledRowSet, SamplingOptions};
