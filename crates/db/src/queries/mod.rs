// crates/db/src/queries/mod.rs
// Job store operations, one `impl Database` block per table.

mod actions;
mod groups;
mod jobs;

pub use jobs::new_running_job;

use crate::DbError;

/// Map a UNIQUE/PRIMARY KEY violation to `AlreadyExists`, pass everything else through.
pub(crate) fn map_unique_violation(err: sqlx::Error, id: &str) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::AlreadyExists(id.to_string())
        }
        _ => DbError::Sqlx(err),
    }
}

/// Counts are `u64` in the domain and `INTEGER` (i64) in SQLite.
pub(crate) fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn from_db_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
