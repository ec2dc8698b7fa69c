//! Scan job execution.

pub mod executor;

pub use executor::{ExecutorError, JobExecutor, JobOutcome, JobSettings, ScanRequest};
