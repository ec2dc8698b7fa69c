// crates/core/src/extensions.rs
//! Extension filter normalization.

use std::collections::BTreeSet;
use std::path::Path;

/// Normalize a user-supplied extension list into lowercase, dot-prefixed
/// entries. Returns `None` (no filter) when the list is absent or nothing
/// non-empty survives trimming.
pub fn normalize_extensions(exts: Option<&[String]>) -> Option<BTreeSet<String>> {
    let exts = exts?;
    let out: BTreeSet<String> = exts
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
        .collect();
    (!out.is_empty()).then_some(out)
}

/// True when `path` passes `filter`. A `None` filter accepts everything;
/// files without an extension never match a filter.
pub fn matches_extension(path: &Path, filter: Option<&BTreeSet<String>>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    match path.extension() {
        Some(ext) => {
            let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
            filter.contains(&ext)
        }
        None => false,
    }
}
