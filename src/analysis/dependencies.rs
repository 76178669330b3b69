//! Cell and named-range references used by a formula

use crate::types::{CellAddress, Dependencies};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z]+[0-9]+(?::[A-Z]+[0-9]+)?\b")
            .expect("cell reference regex must compile")
    })
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z_][A-Za-z0-9_.]*\b").expect("identifier regex must compile")
    })
}

/// References found in `formula`.
///
/// Cell references keep range form (`B2:B9`) with `$` markers dropped.
/// Only identifiers that are defined names of the workbook count as
/// named ranges. Duplicates are removed, first occurrence order kept.
pub fn extract_dependencies(formula: &str, defined_names: &BTreeSet<String>) -> Dependencies {
    let text = formula.replace('$', "");
    let mut deps = Dependencies::default();

    for m in reference_re().find_iter(&text) {
        // LOG10(...) and friends
        if text[m.end()..].starts_with('(') {
            continue;
        }
        let reference = m.as_str().to_string();
        if !deps.cell_references.contains(&reference) {
            deps.cell_references.push(reference);
        }
    }

    if !defined_names.is_empty() {
        for m in identifier_re().find_iter(&text) {
            let name = m.as_str();
            if text[m.end()..].starts_with('(') || !defined_names.contains(name) {
                continue;
            }
            if !deps.named_ranges.iter().any(|n| n == name) {
                deps.named_ranges.push(name.to_string());
            }
        }
    }

    deps
}

/// Same-sheet cells a formula points at, range endpoints included.
/// References qualified with another sheet are not followed.
pub fn local_cells(formula: &str) -> Vec<CellAddress> {
    let text = formula.replace('$', "");
    let mut cells = Vec::new();

    for m in reference_re().find_iter(&text) {
        if text[m.end()..].starts_with('(') || text[..m.start()].ends_with('!') {
            continue;
        }
        for endpoint in m.as_str().split(':') {
            if let Ok(address) = endpoint.parse::<CellAddress>() {
                cells.push(address);
            }
        }
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cell_references() {
        let deps = extract_dependencies("=SUM(B2:B9)+C1*$D$4", &BTreeSet::new());
        assert_eq!(deps.cell_references, vec!["B2:B9", "C1", "D4"]);
        assert!(deps.named_ranges.is_empty());
    }

    #[test]
    fn test_function_names_are_not_references() {
        let deps = extract_dependencies("=LOG10(A1)+ATAN2(B1,C1)", &BTreeSet::new());
        assert_eq!(deps.cell_references, vec!["A1", "B1", "C1"]);
    }

    #[test]
    fn test_named_ranges_must_be_defined() {
        let deps = extract_dependencies("=Revenue*TaxRate-Other", &names(&["TaxRate", "Revenue"]));
        assert_eq!(deps.named_ranges, vec!["Revenue", "TaxRate"]);
        assert!(deps.cell_references.is_empty());
    }

    #[test]
    fn test_duplicates_removed() {
        let deps = extract_dependencies("=A1+A1*Rate/Rate", &names(&["Rate"]));
        assert_eq!(deps.cell_references, vec!["A1"]);
        assert_eq!(deps.named_ranges, vec!["Rate"]);
    }

    #[test]
    fn test_no_references() {
        assert!(extract_dependencies("=TODAY()", &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_local_cells() {
        let cells = local_cells("=SUM(B2:B4)+Other!C1+D5");
        let printed: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        assert_eq!(printed, vec!["B2", "B4", "D5"]);
    }
}
