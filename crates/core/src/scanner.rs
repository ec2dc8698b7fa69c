// crates/core/src/scanner.rs
//! Recursive filesystem walk producing candidate files for a scan job.
//!
//! The producer is lazy: the executor pulls entries one at a time and can
//! checkpoint progress while the walk is still running. Failures local to a
//! single entry (unreadable directory, stat error) are logged and skipped;
//! only an `Err` item yielded by the stream aborts the job.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::extensions::matches_extension;
use crate::types::FileEntry;

/// Lazy sequence of files found under a root.
pub type FileStream = Box<dyn Iterator<Item = Result<FileEntry, ScanError>> + Send>;

/// Source of candidate files for a job.
pub trait FileProducer: Send + Sync {
    /// Start a fresh walk of `root`. Each call restarts from the beginning.
    fn produce(&self, root: &Path, filter: Option<&BTreeSet<String>>) -> FileStream;
}

/// Default producer backed by `walkdir`. Symlinks are not followed and
/// only regular files are yielded.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkdirProducer;

impl FileProducer for WalkdirProducer {
    fn produce(&self, root: &Path, filter: Option<&BTreeSet<String>>) -> FileStream {
        info!(root = %root.display(), extensions = ?filter, "Starting filesystem walk");
        let filter = filter.cloned();

        let iter = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable entry");
                        return None;
                    }
                };
                if !entry.file_type().is_file() {
                    return None;
                }
                if !matches_extension(entry.path(), filter.as_ref()) {
                    return None;
                }
                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Failed to stat file");
                        return None;
                    }
                };
                Some(Ok(FileEntry {
                    file_name: entry.file_name().to_string_lossy().into_owned(),
                    size_bytes: metadata.len(),
                    path: entry.into_path(),
                }))
            });

        Box::new(iter)
    }
}

/// Resolve a user-supplied root to an absolute directory path.
///
/// A leading `~` expands to the home directory. Anything that does not
/// resolve to an existing directory is rejected before a job is created.
pub fn validate_root(raw: &str) -> Result<PathBuf, ScanError> {
    let expanded = expand_home(raw.trim());
    let canonical =
        std::fs::canonicalize(&expanded).map_err(|_| ScanError::invalid_root(&expanded))?;
    if !canonical.is_dir() {
        return Err(ScanError::invalid_root(canonical));
    }
    Ok(canonical)
}

fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    match (raw.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::normalize_extensions;
    use std::fs;
    use tempfile::tempdir;

    fn collect(root: &Path, filter: Option<&BTreeSet<String>>) -> Vec<FileEntry> {
        let mut files: Vec<FileEntry> = WalkdirProducer
            .produce(root, filter)
            .collect::<Result<_, _>>()
            .unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    #[test]
    fn test_walk_recurses_and_reports_sizes() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("nested/deeper")).unwrap();
        fs::write(tmp.path().join("a.txt"), "0123456789").unwrap();
        fs::write(tmp.path().join("nested/deeper/b.bin"), [0u8; 32]).unwrap();

        let files = collect(tmp.path(), None);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_name, "a.txt");
        assert_eq!(files[0].size_bytes, 10);
        assert_eq!(files[1].file_name, "b.bin");
        assert_eq!(files[1].size_bytes, 32);
    }

    #[test]
    fn test_walk_applies_extension_filter() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("keep.PDF"), "x").unwrap();
        fs::write(tmp.path().join("drop.txt"), "x").unwrap();
        fs::write(tmp.path().join("noext"), "x").unwrap();

        let exts = vec!["pdf".to_string()];
        let filter = normalize_extensions(Some(exts.as_slice()));
        let files = collect(tmp.path(), filter.as_ref());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "keep.PDF");
    }

    #[test]
    fn test_walk_empty_dir() {
        let tmp = tempdir().unwrap();
        assert!(collect(tmp.path(), None).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("real.txt"), "data").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("link.txt"))
            .unwrap();
        let files = collect(tmp.path(), None);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "real.txt");
    }

    #[test]
    fn test_validate_root_rejects_missing_and_files() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            validate_root(tmp.path().join("missing").to_str().unwrap()),
            Err(ScanError::InvalidRoot { .. })
        ));
        assert!(matches!(
            validate_root(file.to_str().unwrap()),
            Err(ScanError::InvalidRoot { .. })
        ));
        let ok = validate_root(tmp.path().to_str().unwrap()).unwrap();
        assert!(ok.is_absolute());
    }
}
