//! SQLite usage ledger.
//!
//! Append-only. Rows are kept when accounts or students are deleted.

use edubudget_core::repository::ledger::UsageLedgerRepository;
use edubudget_types::account::AccountId;
use edubudget_types::error::RepositoryError;
use edubudget_types::student::StudentId;
use edubudget_types::usage::{TokenCost, UsageEvent};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, from_db_tokens, parse_datetime, to_db_tokens};

pub struct SqliteUsageLedger {
    pool: DatabasePool,
}

impl SqliteUsageLedger {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct EventRow {
    id: String,
    account_id: Option<String>,
    admin_id: String,
    student_id: Option<String>,
    document: String,
    prompt_tokens: i64,
    completion_tokens: i64,
    total_tokens: i64,
    recorded_at: String,
}

impl EventRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            admin_id: row.try_get("admin_id")?,
            student_id: row.try_get("student_id")?,
            document: row.try_get("document")?,
            prompt_tokens: row.try_get("prompt_tokens")?,
            completion_tokens: row.try_get("completion_tokens")?,
            total_tokens: row.try_get("total_tokens")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    fn into_event(self) -> Result<UsageEvent, RepositoryError> {
        let invalid = |what: &str, e: &dyn std::fmt::Display| {
            RepositoryError::Query(format!("invalid {what}: {e}"))
        };

        Ok(UsageEvent {
            id: self.id.parse().map_err(|e| invalid("event id", &e))?,
            account_id: self
                .account_id
                .as_deref()
                .map(|a| a.parse::<AccountId>().map_err(|e| invalid("account id", &e)))
                .transpose()?,
            admin_id: self
                .admin_id
                .parse::<AccountId>()
                .map_err(|e| invalid("admin id", &e))?,
            student_id: self
                .student_id
                .as_deref()
                .map(|s| s.parse::<StudentId>().map_err(|e| invalid("student id", &e)))
                .transpose()?,
            document: self.document,
            cost: TokenCost {
                prompt_tokens: from_db_tokens(self.prompt_tokens)?,
                completion_tokens: from_db_tokens(self.completion_tokens)?,
                total_tokens: from_db_tokens(self.total_tokens)?,
            },
            recorded_at: parse_datetime(&self.recorded_at)?,
        })
    }
}

fn map_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<UsageEvent>, RepositoryError> {
    rows.iter()
        .map(|row| {
            EventRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_event()
        })
        .collect()
}

impl UsageLedgerRepository for SqliteUsageLedger {
    async fn append(&self, event: &UsageEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO usage_events (id, account_id, admin_id, student_id, document, prompt_tokens, completion_tokens, total_tokens, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(event.account_id.as_ref().map(|a| a.to_string()))
        .bind(event.admin_id.to_string())
        .bind(event.student_id.as_ref().map(|s| s.to_string()))
        .bind(&event.document)
        .bind(to_db_tokens(event.cost.prompt_tokens)?)
        .bind(to_db_tokens(event.cost.completion_tokens)?)
        .bind(to_db_tokens(event.cost.total_tokens)?)
        .bind(format_datetime(&event.recorded_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn students_total(&self, admin_id: &AccountId) -> Result<u64, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(e.total_tokens), 0) FROM usage_events e
             JOIN students s ON s.id = e.student_id AND s.admin_id = e.admin_id
             WHERE e.admin_id = ?",
        )
        .bind(admin_id.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        from_db_tokens(total)
    }

    async fn list_for_student(&self, student_id: &StudentId) -> Result<Vec<UsageEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM usage_events WHERE student_id = ? ORDER BY recorded_at ASC, id ASC",
        )
        .bind(student_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows)
    }

    async fn list_for_admin(&self, admin_id: &AccountId) -> Result<Vec<UsageEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM usage_events WHERE admin_id = ? ORDER BY recorded_at ASC, id ASC",
        )
        .bind(admin_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows)
    }
}
