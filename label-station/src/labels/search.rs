//! Search matching
//!
//! Material names are typed inconsistently ("VG0100", "vg100", "Vg 0100"),
//! so names are compared in a normalised form: lowercase letters followed by
//! the number without leading zeros.

use super::types::LabelRecord;
use regex::Regex;
use std::sync::LazyLock;

static MATERIAL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]+)\s*0*(\d+)$").expect("static pattern"));

/// Normalise a material name for comparison
///
/// `VG0100` and `vg100` both become `vg100`. Anything not shaped like
/// letters + number is only trimmed and lowercased.
pub fn normalize_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match MATERIAL_NAME.captures(&lower) {
        Some(caps) => format!("{}{}", &caps[1], &caps[2]),
        None => lower,
    }
}

/// Case-insensitive match of `query` against a record
///
/// Matches a substring of the code or of any field value, or a substring of
/// the normalised material name. An empty query matches everything.
pub fn matches(record: &LabelRecord, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    if record.code.to_lowercase().contains(&needle) {
        return true;
    }
    if record
        .fields
        .iter()
        .any(|(_, v)| v.to_lowercase().contains(&needle))
    {
        return true;
    }

    match record.name() {
        Some(name) => normalize_name(name).contains(&normalize_name(&needle)),
        None => false,
    }
}
