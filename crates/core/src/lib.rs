// crates/core/src/lib.rs
//! Domain types and the filesystem collaborators of the dupe-manager scan
//! pipeline: the producer (recursive walk), the classifier (name + size
//! grouping) and the deleter.

pub mod classifier;
pub mod deleter;
pub mod error;
pub mod extensions;
pub mod scanner;
pub mod types;

pub use classifier::{group_key, Classifier, NameSizeClassifier};
pub use deleter::{delete_file, file_size_if_regular, DeleteOutcome};
pub use error::*;
pub use extensions::{matches_extension, normalize_extensions};
pub use scanner::{validate_root, FileProducer, FileStream, WalkdirProducer};
pub use types::*;

/// Current UTC time as an RFC 3339 string, the timestamp format used for
/// every persisted record.
pub fn utc_now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
