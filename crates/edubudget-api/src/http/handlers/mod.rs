//! HTTP request handlers for the REST API.

pub mod account;
pub mod budget;
pub mod student;

use edubudget_types::account::AccountId;
use edubudget_types::student::StudentId;

use crate::http::error::AppError;

pub(crate) fn parse_account_id(raw: &str) -> Result<AccountId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid account id: '{raw}'")))
}

pub(crate) fn parse_student_id(raw: &str) -> Result<StudentId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid student id: '{raw}'")))
}
