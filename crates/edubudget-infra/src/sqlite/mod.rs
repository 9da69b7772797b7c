//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod account;
pub mod ledger;
pub mod pool;
pub mod student;

use chrono::{DateTime, Utc};
use edubudget_types::error::RepositoryError;

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Token counters are `u64` in the domain and `INTEGER` (i64) in SQLite.
pub(crate) fn to_db_tokens(tokens: u64) -> Result<i64, RepositoryError> {
    i64::try_from(tokens)
        .map_err(|_| RepositoryError::Query(format!("token count {tokens} out of range")))
}

pub(crate) fn from_db_tokens(value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value)
        .map_err(|_| RepositoryError::Query(format!("negative token count {value} in storage")))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> pool::DatabasePool {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    // Leak tempdir so it lives for the test
    std::mem::forget(dir);
    pool::DatabasePool::new(&url).await.unwrap()
}
