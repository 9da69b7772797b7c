//! Student record handlers: roster, reported usage, token summaries.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use edubudget_types::error::validate_amount;
use edubudget_types::student::{CreateStudentRequest, StudentRecord};
use edubudget_types::usage::{TokenCost, TokenSummary, UsageEvent};

use super::{parse_account_id, parse_student_id};
use crate::http::error::AppError;
use crate::http::response::{ApiResult, RequestTimer};
use crate::state::AppState;

/// Token counts as reported by the analysis service.
///
/// Either `tokens` alone or the prompt/completion split. Signed so that a
/// negative count is rejected with a validation error instead of a 422.
#[derive(Debug, Default, Deserialize)]
pub struct CostBody {
    pub tokens: Option<i64>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
}

impl CostBody {
    pub(crate) fn into_cost(self) -> Result<TokenCost, AppError> {
        match (self.tokens, self.prompt_tokens, self.completion_tokens) {
            (Some(total), None, None) => Ok(TokenCost::total(validate_amount(total)?)),
            (None, prompt, completion) if prompt.is_some() || completion.is_some() => {
                Ok(TokenCost::new(
                    validate_amount(prompt.unwrap_or(0))?,
                    validate_amount(completion.unwrap_or(0))?,
                ))
            }
            (None, None, None) => Err(AppError::Validation(
                "either 'tokens' or 'prompt_tokens'/'completion_tokens' is required".to_string(),
            )),
            _ => Err(AppError::Validation(
                "'tokens' cannot be combined with 'prompt_tokens'/'completion_tokens'".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StudentUsageBody {
    #[serde(flatten)]
    pub cost: CostBody,
    #[serde(default)]
    pub document: String,
}

/// POST /api/v1/admins/{id}/students - Register a student under an admin.
pub async fn add_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CreateStudentRequest>,
) -> ApiResult<StudentRecord> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;

    let student = state.account_service.add_student(&admin_id, body).await?;
    let self_link = format!("/api/v1/students/{}", student.id);
    let tokens_link = format!("/api/v1/students/{}/tokens", student.id);

    Ok(Json(
        timer
            .finish(student)
            .with_link("self", self_link)
            .with_link("tokens", tokens_link),
    ))
}

/// GET /api/v1/admins/{id}/students
pub async fn list_students(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<StudentRecord>> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;
    let students = state.account_service.list_students(&admin_id).await?;
    Ok(Json(timer.finish(students)))
}

/// GET /api/v1/admins/{id}/students/tokens - Per-student summaries, heaviest first.
pub async fn list_summaries(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<TokenSummary>> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;
    // Unknown admins answer 404 rather than an empty list.
    state.account_service.get_account(&admin_id).await?;

    let summaries = state
        .budget_service
        .summaries()
        .student_summaries(&admin_id)
        .await?;
    Ok(Json(timer.finish(summaries)))
}

/// GET /api/v1/students/{id}
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StudentRecord> {
    let timer = RequestTimer::start();
    let student_id = parse_student_id(&id)?;
    let student = state.account_service.get_student(&student_id).await?;
    Ok(Json(timer.finish(student)))
}

/// DELETE /api/v1/students/{id} - Ledger history is kept.
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let timer = RequestTimer::start();
    let student_id = parse_student_id(&id)?;
    state.account_service.delete_student(&student_id).await?;
    Ok(Json(timer.finish(serde_json::json!({ "deleted": true }))))
}

/// POST /api/v1/students/{id}/usage - Log a student's analysis.
///
/// Reported only; the owning admin's budget is not charged.
pub async fn record_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StudentUsageBody>,
) -> ApiResult<UsageEvent> {
    let timer = RequestTimer::start();
    let student_id = parse_student_id(&id)?;
    let cost = body.cost.into_cost()?;

    let event = state
        .budget_service
        .recorder()
        .record_student_usage(&student_id, cost, &body.document)
        .await?;
    Ok(Json(
        timer
            .finish(event)
            .with_link("tokens", format!("/api/v1/students/{student_id}/tokens")),
    ))
}

/// GET /api/v1/students/{id}/tokens
pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TokenSummary> {
    let timer = RequestTimer::start();
    let student_id = parse_student_id(&id)?;
    let summary = state
        .budget_service
        .summaries()
        .student_summary(&student_id)
        .await?;
    Ok(Json(timer.finish(summary)))
}
