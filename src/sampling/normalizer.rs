//! Row-relative formula signatures
//!
//! `=F15-D16+E16` becomes `=F[n]-D[n+1]+E[n+1]`: every cell reference keeps
//! its column and has its row rewritten relative to the first reference.
//! Formulas copied down a column therefore share one signature.

use regex::Regex;
use std::sync::OnceLock;

fn cell_ref_re() -> &'static Regex {
    static CELL_RE: OnceLock<Regex> = OnceLock::new();
    CELL_RE.get_or_init(|| {
        Regex::new(r"\b([A-Z]+)([0-9]+)\b").expect("cell reference regex must compile")
    })
}

/// Normalize a formula into its row-relative signature.
///
/// Absolute markers (`$`) are dropped. Tokens followed by `(` are function
/// names (`LOG10(`) and are left alone. Case and whitespace are preserved.
pub fn normalize_formula(formula: &str) -> String {
    if formula.is_empty() {
        return String::new();
    }

    let body = formula.strip_prefix('=').unwrap_or(formula).replace('$', "");
    let mut normalized = String::with_capacity(body.len() + 8);
    let mut base_row: Option<i64> = None;
    let mut last = 0;

    for caps in cell_ref_re().captures_iter(&body) {
        let (Some(whole), Some(column), Some(row)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if body[whole.end()..].starts_with('(') {
            continue;
        }
        let Ok(row) = row.as_str().parse::<i64>() else {
            continue;
        };

        let offset = row - *base_row.get_or_insert(row);
        normalized.push_str(&body[last..whole.start()]);
        normalized.push_str(column.as_str());
        normalized.push_str(&row_marker(offset));
        last = whole.end();
    }
    normalized.push_str(&body[last..]);

    format!("={}", normalized)
}

fn row_marker(offset: i64) -> String {
    match offset {
        0 => "[n]".to_string(),
        k if k > 0 => format!("[n+{}]", k),
        k => format!("[n-{}]", -k),
    }
}
