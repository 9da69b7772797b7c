//! SQLite student record repository.

use edubudget_core::repository::student::StudentRepository;
use edubudget_types::account::AccountId;
use edubudget_types::error::RepositoryError;
use edubudget_types::student::{StudentId, StudentRecord};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

pub struct SqliteStudentRepository {
    pool: DatabasePool,
}

impl SqliteStudentRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn student_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<StudentRecord, RepositoryError> {
    let get = |col: &str| -> Result<String, RepositoryError> {
        row.try_get(col)
            .map_err(|e: sqlx::Error| RepositoryError::Query(e.to_string()))
    };

    Ok(StudentRecord {
        id: get("id")?
            .parse::<StudentId>()
            .map_err(|e| RepositoryError::Query(format!("invalid student id: {e}")))?,
        admin_id: get("admin_id")?
            .parse::<AccountId>()
            .map_err(|e| RepositoryError::Query(format!("invalid admin id: {e}")))?,
        name: get("name")?,
        course: get("course")?,
        created_at: parse_datetime(&get("created_at")?)?,
    })
}

impl StudentRepository for SqliteStudentRepository {
    async fn create(&self, student: &StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO students (id, admin_id, name, course, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(student.id.to_string())
        .bind(student.admin_id.to_string())
        .bind(&student.name)
        .bind(&student.course)
        .bind(format_datetime(&student.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(student.clone()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                Err(RepositoryError::Conflict(format!(
                    "admin '{}' does not exist",
                    student.admin_id
                )))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("student '{}' already exists", student.id)),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_by_id(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM students WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(student_from_row).transpose()
    }

    async fn list_by_admin(&self, admin_id: &AccountId) -> Result<Vec<StudentRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM students WHERE admin_id = ? ORDER BY name ASC, id ASC")
            .bind(admin_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(student_from_row).collect()
    }

    async fn delete(&self, id: &StudentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
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
