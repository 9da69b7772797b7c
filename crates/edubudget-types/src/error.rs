use thiserror::Error;

/// Errors raised by the budget subsystem.
///
/// A denied admission is not an error: it is an `AdmissionDecision` with
/// `allowed == false`.
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("account '{0}' not found")]
    AccountNotFound(String),

    #[error("student '{0}' not found")]
    StudentNotFound(String),

    #[error("invalid token amount: {0}")]
    InvalidAmount(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for BudgetError {
    fn from(e: RepositoryError) -> Self {
        BudgetError::Storage(e.to_string())
    }
}

/// Errors from repository operations (used by trait definitions in edubudget-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// A counter increment would leave the storable range. Nothing was written.
    #[error("counter overflow: {0}")]
    Overflow(String),
}

/// Validate a token amount received from an untyped boundary (JSON, CLI).
///
/// Negative amounts are rejected with [`BudgetError::InvalidAmount`] so no
/// state is touched.
pub fn validate_amount(amount: i64) -> Result<u64, BudgetError> {
    u64::try_from(amount)
        .map_err(|_| BudgetError::InvalidAmount(format!("{amount} is negative")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_error_display() {
        let err = BudgetError::AccountNotFound("abc".to_string());
        assert_eq!(err.to_string(), "account 'abc' not found");
    }

    #[test]
    fn test_repository_error_converts_to_storage() {
        let err: BudgetError = RepositoryError::Query("syntax error".to_string()).into();
        assert!(matches!(err, BudgetError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: query error: syntax error");
    }

    #[test]
    fn test_validate_amount() {
        assert_eq!(validate_amount(0).unwrap(), 0);
        assert_eq!(validate_amount(2_000).unwrap(), 2_000);
        assert!(matches!(
            validate_amount(-1),
            Err(BudgetError::InvalidAmount(_))
        ));
    }
}
