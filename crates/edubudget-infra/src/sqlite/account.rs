//! SQLite account repository implementation.
//!
//! Implements `AccountRepository` from `edubudget-core` using sqlx with split
//! read/write pools. Usage increments are a single `UPDATE ... RETURNING`
//! statement on the writer, so concurrent charges never lose an update.

use edubudget_core::repository::account::{AccountFilter, AccountRepository};
use edubudget_types::account::{Account, AccountId, Role, TokenUsage};
use edubudget_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, from_db_tokens, parse_datetime, to_db_tokens};

/// SQLite-backed implementation of `AccountRepository`.
pub struct SqliteAccountRepository {
    pool: DatabasePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain Account.
struct AccountRow {
    id: String,
    role: String,
    parent_admin_id: Option<String>,
    name: String,
    email: Option<String>,
    used: i64,
    token_limit: i64,
    created_at: String,
    updated_at: String,
}

impl AccountRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            role: row.try_get("role")?,
            parent_admin_id: row.try_get("parent_admin_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            used: row.try_get("used")?,
            token_limit: row.try_get("token_limit")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_account(self) -> Result<Account, RepositoryError> {
        let id = self
            .id
            .parse::<AccountId>()
            .map_err(|e| RepositoryError::Query(format!("invalid account id: {e}")))?;

        let role: Role = self.role.parse().map_err(RepositoryError::Query)?;

        let parent_admin_id = self
            .parent_admin_id
            .as_deref()
            .map(|p| {
                p.parse::<AccountId>()
                    .map_err(|e| RepositoryError::Query(format!("invalid parent id: {e}")))
            })
            .transpose()?;

        let account = Account {
            id,
            role,
            parent_admin_id,
            name: self.name,
            email: self.email,
            token_usage: TokenUsage {
                used: from_db_tokens(self.used)?,
                limit: from_db_tokens(self.token_limit)?,
            },
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        };
        Ok(account.normalized())
    }
}

fn map_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Account>, RepositoryError> {
    let mut accounts = Vec::with_capacity(rows.len());
    for row in rows {
        let account_row =
            AccountRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        accounts.push(account_row.into_account()?);
    }
    Ok(accounts)
}

impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, account: &Account) -> Result<Account, RepositoryError> {
        let account = account.clone().normalized();

        let result = sqlx::query(
            "INSERT INTO accounts (id, role, parent_admin_id, name, email, used, token_limit, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(account.id.to_string())
        .bind(account.role.to_string())
        .bind(account.parent_admin_id.as_ref().map(|p| p.to_string()))
        .bind(&account.name)
        .bind(&account.email)
        .bind(to_db_tokens(account.token_usage.used)?)
        .bind(to_db_tokens(account.token_usage.limit)?)
        .bind(format_datetime(&account.created_at))
        .bind(format_datetime(&account.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(account),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("account '{}' already exists", account.id)),
            ),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                Err(RepositoryError::Conflict(
                    "parent admin does not exist".to_string(),
                ))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_by_id(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let account_row =
                    AccountRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(account_row.into_account()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: Option<AccountFilter>) -> Result<Vec<Account>, RepositoryError> {
        let filter = filter.unwrap_or_default();

        let rows = sqlx::query(
            "SELECT * FROM accounts
             WHERE (?1 IS NULL OR role = ?1) AND (?2 IS NULL OR parent_admin_id = ?2)
             ORDER BY created_at ASC, id ASC",
        )
        .bind(filter.role.map(|r| r.to_string()))
        .bind(filter.parent_admin_id.map(|p| p.to_string()))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows)
    }

    async fn list_teachers_of(&self, admin_id: &AccountId) -> Result<Vec<Account>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM accounts WHERE role = 'teacher' AND parent_admin_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(admin_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows)
    }

    async fn update(&self, account: &Account) -> Result<Account, RepositoryError> {
        let account = account.clone().normalized();

        let row = sqlx::query(
            "UPDATE accounts SET name = ?, email = ?, token_limit = ?, updated_at = ?
             WHERE id = ?
             RETURNING *",
        )
        .bind(&account.name)
        .bind(&account.email)
        .bind(to_db_tokens(account.token_usage.limit)?)
        .bind(format_datetime(&account.updated_at))
        .bind(account.id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = row.ok_or(RepositoryError::NotFound)?;
        AccountRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_account()
    }

    async fn increment_used(&self, id: &AccountId, tokens: u64) -> Result<TokenUsage, RepositoryError> {
        let overflow = || RepositoryError::Overflow(format!("adding {tokens} to account '{id}'"));
        let delta = i64::try_from(tokens).map_err(|_| overflow())?;

        // The guard in WHERE keeps `used` an INTEGER; SQLite would promote it to REAL.
        let row = sqlx::query(
            "UPDATE accounts SET used = used + ?1, updated_at = ?2
             WHERE id = ?3 AND used <= 9223372036854775807 - ?1
             RETURNING used, token_limit",
        )
        .bind(delta)
        .bind(format_datetime(&chrono::Utc::now()))
        .bind(id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            return Err(if exists.is_some() {
                overflow()
            } else {
                RepositoryError::NotFound
            });
        };

        let used: i64 = row
            .try_get("used")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let limit: i64 = row
            .try_get("token_limit")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(TokenUsage {
            used: from_db_tokens(used)?,
            limit: from_db_tokens(limit)?,
        })
    }

    async fn delete(&self, id: &AccountId) -> Result<(), RepositoryError> {
        // Teachers and students go with their admin through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_pool;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_and_get_by_id() {
        let repo = SqliteAccountRepository::new(test_pool().await);
        let admin = Account::new_admin("Liceo Norte", Some("admin@liceo.edu".to_string()), 50_000);

        repo.create(&admin).await.unwrap();

        let found = repo.get_by_id(&admin.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Liceo Norte");
        assert_eq!(found.role, Role::Admin);
        assert_eq!(found.email.as_deref(), Some("admin@liceo.edu"));
        assert_eq!(found.token_usage, TokenUsage { used: 0, limit: 50_000 });

        assert!(repo.get_by_id(&AccountId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_teacher_limit_is_forced_to_zero() {
        let repo = SqliteAccountRepository::new(test_pool().await);
        let admin = Account::new_admin("School", None, 10_000);
        repo.create(&admin).await.unwrap();

        let mut teacher = Account::new_teacher(admin.id.clone(), "Mr. Soto", None);
        teacher.token_usage.limit = 99;
        let created = repo.create(&teacher).await.unwrap();
        assert_eq!(created.token_usage.limit, 0);

        let found = repo.get_by_id(&teacher.id).await.unwrap().unwrap();
        assert_eq!(found.token_usage.limit, 0);
        assert_eq!(found.parent_admin_id, Some(admin.id));
    }

    #[tokio::test]
    async fn test_teacher_requires_existing_parent() {
        let repo = SqliteAccountRepository::new(test_pool().await);
        let teacher = Account::new_teacher(AccountId::new(), "Ghost", None);

        let err = repo.create(&teacher).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        let repo = SqliteAccountRepository::new(test_pool().await);
        let first = Account::new_admin("First", None, 1_000);
        let second = Account::new_admin("Second", None, 1_000);
        repo.create(&first).await.unwrap();
        repo.create(&second).await.unwrap();
        repo.create(&Account::new_teacher(first.id.clone(), "T1", None))
            .await
            .unwrap();
        repo.create(&Account::new_teacher(second.id.clone(), "T2", None))
            .await
            .unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 4);

        let admins = repo
            .list(Some(AccountFilter {
                role: Some(Role::Admin),
                ..Default::default()
            }))
            .await
            .unwrap();
        let names: Vec<&str> = admins.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);

        let teachers = repo.list_teachers_of(&first.id).await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].name, "T1");

        let by_parent = repo
            .list(Some(AccountFilter {
                parent_admin_id: Some(second.id.clone()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(by_parent.len(), 1);
        assert_eq!(by_parent[0].name, "T2");
    }

    #[tokio::test]
    async fn test_increment_used_is_additive() {
        let repo = SqliteAccountRepository::new(test_pool().await);
        let admin = Account::new_admin("School", None, 10_000);
        repo.create(&admin).await.unwrap();

        assert_eq!(repo.increment_used(&admin.id, 1_200).await.unwrap().used, 1_200);
        assert_eq!(repo.increment_used(&admin.id, 0).await.unwrap().used, 1_200);
        let usage = repo.increment_used(&admin.id, 300).await.unwrap();
        assert_eq!(usage, TokenUsage { used: 1_500, limit: 10_000 });

        let err = repo.increment_used(&AccountId::new(), 1).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_overflowing_increment_writes_nothing() {
        let repo = SqliteAccountRepository::new(test_pool().await);
        let admin = Account::new_admin("School", None, 10_000);
        repo.create(&admin).await.unwrap();

        let max = i64::MAX as u64;
        assert_eq!(repo.increment_used(&admin.id, max).await.unwrap().used, max);

        let err = repo.increment_used(&admin.id, 1).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Overflow(_)));
        let err = repo.increment_used(&admin.id, u64::MAX).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Overflow(_)));

        // The row still decodes and the counter is where it was.
        let found = repo.get_by_id(&admin.id).await.unwrap().unwrap();
        assert_eq!(found.token_usage.used, max);
        assert_eq!(repo.increment_used(&admin.id, 0).await.unwrap().used, max);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let repo = Arc::new(SqliteAccountRepository::new(test_pool().await));
        let admin = Account::new_admin("School", None, 1_000_000);
        repo.create(&admin).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = repo.clone();
            let id = admin.id.clone();
            handles.push(tokio::spawn(async move {
                repo.increment_used(&id, 50).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let found = repo.get_by_id(&admin.id).await.unwrap().unwrap();
        assert_eq!(found.token_usage.used, 1_000);
    }

    #[tokio::test]
    async fn test_update_does_not_touch_used() {
        let repo = SqliteAccountRepository::new(test_pool().await);
        let admin = Account::new_admin("School", None, 10_000);
        repo.create(&admin).await.unwrap();
        repo.increment_used(&admin.id, 700).await.unwrap();

        let mut stale = admin.clone();
        stale.name = "Renamed".to_string();
        stale.token_usage.limit = 20_000;
        let updated = repo.update(&stale).await.unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.token_usage, TokenUsage { used: 700, limit: 20_000 });

        let missing = Account::new_admin("Nobody", None, 1);
        assert!(matches!(
            repo.update(&missing).await.unwrap_err(),
            RepositoryError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_delete_admin_cascades_to_teachers() {
        let repo = SqliteAccountRepository::new(test_pool().await);
        let admin = Account::new_admin("School", None, 10_000);
        let teacher = Account::new_teacher(admin.id.clone(), "Ms. Paz", None);
        repo.create(&admin).await.unwrap();
        repo.create(&teacher).await.unwrap();

        repo.delete(&admin.id).await.unwrap();

        assert!(repo.get_by_id(&teacher.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&admin.id).await.unwrap_err(),
            RepositoryError::NotFound
        ));
    }
}
