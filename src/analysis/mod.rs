//! Lightweight workbook analyses feeding the enriched context

mod column_types;
mod dependencies;
mod patterns;
mod tables;
mod validation;

pub use column_types::extract_column_types;
pub use dependencies::{extract_dependencies, local_cells};
pub use patterns::{
    extract_formula_patterns, extract_samples, implementation_notes, js_equivalent, MAX_PATTERNS,
    MAX_SAMPLES,
};
pub use tables::{extract_tables, structured_references};
pub use validation::{extract_pivot_tables, extract_validation, MAX_RULES_PER_SHEET};
