//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository traits, but AppState pins them to the
//! SQLite implementations. One `BudgetService` is shared by every request so
//! that all guarded charges go through the same per-admin gates.

use std::path::PathBuf;
use std::sync::Arc;

use edubudget_core::budget::BudgetService;
use edubudget_core::service::account::AccountService;
use edubudget_infra::config::{database_url, load_config, resolve_data_dir};
use edubudget_infra::sqlite::account::SqliteAccountRepository;
use edubudget_infra::sqlite::ledger::SqliteUsageLedger;
use edubudget_infra::sqlite::pool::DatabasePool;
use edubudget_infra::sqlite::student::SqliteStudentRepository;
use edubudget_types::config::BudgetConfig;

pub type ConcreteAccountService = AccountService<SqliteAccountRepository, SqliteStudentRepository>;

pub type ConcreteBudgetService =
    BudgetService<SqliteAccountRepository, SqliteStudentRepository, SqliteUsageLedger>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub account_service: Arc<ConcreteAccountService>,
    pub budget_service: Arc<ConcreteBudgetService>,
    pub config: Arc<BudgetConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Resolve the data directory, load `config.toml`, open the database.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        Ok(Self::from_pool(db_pool, config, data_dir))
    }

    /// Wire services over an already open pool.
    pub fn from_pool(db_pool: DatabasePool, config: BudgetConfig, data_dir: PathBuf) -> Self {
        let accounts = Arc::new(SqliteAccountRepository::new(db_pool.clone()));
        let students = Arc::new(SqliteStudentRepository::new(db_pool.clone()));
        let ledger = Arc::new(SqliteUsageLedger::new(db_pool.clone()));

        let account_service =
            AccountService::new(accounts.clone(), students.clone(), config.default_admin_limit);
        let budget_service = BudgetService::new(accounts, students, ledger, &config);

        Self {
            account_service: Arc::new(account_service),
            budget_service: Arc::new(budget_service),
            config: Arc::new(config),
            data_dir,
            db_pool,
        }
    }
}
