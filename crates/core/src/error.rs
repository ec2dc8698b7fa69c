// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating a scan root or walking it.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("root_path must be an existing directory: {path}")]
    InvalidRoot { path: PathBuf },

    #[error("scan aborted: {0}")]
    Aborted(String),
}

impl ScanError {
    pub fn invalid_root(path: impl Into<PathBuf>) -> Self {
        Self::InvalidRoot { path: path.into() }
    }
}

/// Errors raised by a [`Classifier`](crate::Classifier).
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification failed: {0}")]
    Failed(String),
}

/// A stored value could not be parsed back into its enum.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
