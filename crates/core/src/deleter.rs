// crates/core/src/deleter.rs
//! Physical removal of a single file. No retries.

use std::path::Path;

use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Failed(String),
}

/// Try to remove `path`. Missing paths and non-files fail without touching
/// anything.
pub fn delete_file(path: &Path) -> DeleteOutcome {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return DeleteOutcome::Failed("file not found".to_string());
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Delete failed");
            return DeleteOutcome::Failed(e.to_string());
        }
    };
    if !metadata.is_file() {
        return DeleteOutcome::Failed("not a file".to_string());
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Deleted file");
            DeleteOutcome::Deleted
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Delete failed");
            DeleteOutcome::Failed(e.to_string())
        }
    }
}

/// Size of `path` if it is a regular file, otherwise 0.
pub fn file_size_if_regular(path: &Path) -> u64 {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .unwrap_or(0)
}
