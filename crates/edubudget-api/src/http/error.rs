//! Application error type mapping to HTTP status codes and envelope format.

use std::convert::Infallible;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use edubudget_core::budget::guard::ChargeError;
use edubudget_types::error::BudgetError;
use edubudget_types::usage::{AdmissionDecision, Verdict};

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Budget and account errors from the core services.
    Budget(BudgetError),
    /// Admission refused an analysis.
    TokensExhausted(AdmissionDecision),
    /// Validation error.
    Validation(String),
}

impl From<BudgetError> for AppError {
    fn from(e: BudgetError) -> Self {
        AppError::Budget(e)
    }
}

impl From<ChargeError<Infallible>> for AppError {
    fn from(e: ChargeError<Infallible>) -> Self {
        match e {
            ChargeError::Denied(decision) => AppError::TokensExhausted(decision),
            ChargeError::Budget(e) => AppError::Budget(e),
            ChargeError::Operation(never) => match never {},
        }
    }
}

fn decision_details(decision: &AdmissionDecision) -> serde_json::Value {
    json!({
        "current_used": decision.current_used,
        "limit": decision.limit,
        "remaining": decision.remaining,
        "reserved": decision.reserved,
        "requested_tokens": decision.requested_tokens,
        "excess": decision.excess,
        "reason": decision.reason,
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::Budget(BudgetError::AccountNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "ACCOUNT_NOT_FOUND",
                format!("Account '{id}' not found"),
                None,
            ),
            AppError::Budget(BudgetError::StudentNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "STUDENT_NOT_FOUND",
                format!("Student '{id}' not found"),
                None,
            ),
            AppError::Budget(BudgetError::InvalidAmount(msg))
            | AppError::Budget(BudgetError::InvalidAccount(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
            }
            AppError::Budget(e @ BudgetError::Storage(_)) => {
                tracing::error!(error = %e, "storage failure while serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string(), None)
            }
            AppError::TokensExhausted(decision) if decision.verdict == Verdict::AdminNotFound => (
                StatusCode::NOT_FOUND,
                "ADMIN_NOT_FOUND",
                "Owning admin not found".to_string(),
                Some(decision_details(decision)),
            ),
            AppError::TokensExhausted(decision) => (
                StatusCode::FORBIDDEN,
                "TOKENS_EXHAUSTED",
                "Token limit reached. Contact your administrator to raise the limit.".to_string(),
                Some(decision_details(decision)),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
            }
        };

        (status, Json(ApiResponse::error(code, message, details))).into_response()
    }
}
