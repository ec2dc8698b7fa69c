// crates/core/src/classifier.rs
//! Duplicate grouping by file name and byte size.

use std::collections::BTreeMap;

use tracing::info;

use crate::error::ClassifyError;
use crate::types::FileEntry;

/// Grouping key for a file: `"{file_name}|{size_bytes}"`.
pub fn group_key(file_name: &str, size_bytes: u64) -> String {
    format!("{file_name}|{size_bytes}")
}

/// Turns the complete set of walked files into result groups.
pub trait Classifier: Send + Sync {
    /// Returns groups keyed by grouping key, each with at least two members.
    fn classify(&self, files: &[FileEntry]) -> Result<BTreeMap<String, Vec<FileEntry>>, ClassifyError>;
}

/// Treats files with the same display name and size as duplicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameSizeClassifier;

impl Classifier for NameSizeClassifier {
    fn classify(&self, files: &[FileEntry]) -> Result<BTreeMap<String, Vec<FileEntry>>, ClassifyError> {
        let mut buckets: BTreeMap<String, Vec<FileEntry>> = BTreeMap::new();
        for file in files {
            buckets
                .entry(group_key(&file.file_name, file.size_bytes))
                .or_default()
                .push(file.clone());
        }
        let total_groups = buckets.len();
        buckets.retain(|_, members| members.len() > 1);
        info!(
            total_groups,
            dup_groups = buckets.len(),
            "Duplicate grouping complete"
        );
        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(path: &str, size: u64) -> FileEntry {
        let path = PathBuf::from(path);
        FileEntry {
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            size_bytes: size,
            path,
        }
    }

    #[test]
    fn test_groups_require_same_name_and_size() {
        let files = vec![
            entry("/x/a.txt", 10),
            entry("/y/a.txt", 10),
            entry("/z/a.txt", 11),
            entry("/x/b.txt", 10),
        ];
        let groups = NameSizeClassifier.classify(&files).unwrap();
        assert_eq!(groups.len(), 1);
        let members = &groups[&group_key("a.txt", 10)];
        assert_eq!(members.len(), 2);
        assert!(members.iter().any(|f| f.path == PathBuf::from("/x/a.txt")));
        assert!(members.iter().any(|f| f.path == PathBuf::from("/y/a.txt")));
    }

    #[test]
    fn test_empty_input_has_no_groups() {
        assert!(NameSizeClassifier.classify(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_group_key_format() {
        assert_eq!(group_key("report.pdf", 2048), "report.pdf|2048");
    }
}
