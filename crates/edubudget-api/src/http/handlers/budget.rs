//! Budget handlers: aggregation, admission, recording and status.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use edubudget_core::budget::ChargeContext;
use edubudget_types::account::{AccountId, TokenUsage};
use edubudget_types::error::validate_amount;
use edubudget_types::usage::{AdmissionDecision, AggregatedUsage, TokenCost, TokenStatus};

use super::student::CostBody;
use super::{parse_account_id, parse_student_id};
use crate::http::error::AppError;
use crate::http::response::{ApiResult, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdmissionBody {
    pub tokens: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordUsageBody {
    #[serde(flatten)]
    pub cost: CostBody,
    pub student_id: Option<String>,
    #[serde(default)]
    pub document: String,
    /// Admit before charging; a denial records nothing.
    #[serde(default)]
    pub enforce: bool,
}

#[derive(Debug, Serialize)]
pub struct RecordedUsage {
    pub account_id: AccountId,
    pub cost: TokenCost,
    pub usage: TokenUsage,
}

/// GET /api/v1/admins/{id}/usage - Aggregated consumption of an admin tree.
pub async fn get_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AggregatedUsage> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;
    let usage = state.budget_service.aggregator().compute(&admin_id).await?;
    Ok(Json(
        timer
            .finish(usage)
            .with_link("status", format!("/api/v1/admins/{admin_id}/status")),
    ))
}

/// POST /api/v1/admins/{id}/admission - Ask whether `tokens` more would fit.
///
/// Answers 200 with the decision whether or not it is allowed.
pub async fn check_admission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AdmissionBody>,
) -> ApiResult<AdmissionDecision> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;
    let tokens = validate_amount(body.tokens)?;

    let decision = state
        .budget_service
        .admission()
        .can_allow(&admin_id, tokens)
        .await?;
    Ok(Json(timer.finish(decision)))
}

/// GET /api/v1/admins/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TokenStatus> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;
    let status = state.budget_service.status().report_status(&admin_id).await?;
    Ok(Json(timer.finish(status)))
}

/// GET /api/v1/accounts/{id}/token-status - Status of the admin the account draws from.
pub async fn get_token_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TokenStatus> {
    let timer = RequestTimer::start();
    let account_id = parse_account_id(&id)?;
    let status = state
        .budget_service
        .status()
        .report_status_for(&account_id)
        .await?;
    Ok(Json(timer.finish(status)))
}

/// POST /api/v1/accounts/{id}/preflight - Admission for one analysis at the
/// configured estimate. A denial answers 403.
pub async fn preflight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AdmissionDecision> {
    let timer = RequestTimer::start();
    let account_id = parse_account_id(&id)?;

    let decision = state.budget_service.admission().preflight(&account_id).await?;
    if !decision.allowed {
        tracing::info!(
            account_id = %account_id,
            excess = decision.excess,
            verdict = ?decision.verdict,
            "analysis refused at preflight"
        );
        return Err(AppError::TokensExhausted(decision));
    }
    Ok(Json(timer.finish(decision)))
}

/// POST /api/v1/accounts/{id}/usage - Charge tokens to an admin or teacher.
pub async fn record_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RecordUsageBody>,
) -> ApiResult<RecordedUsage> {
    let timer = RequestTimer::start();
    let account_id = parse_account_id(&id)?;
    let cost = body.cost.into_cost()?;
    let ctx = match body.student_id.as_deref() {
        Some(raw) => ChargeContext::for_student(parse_student_id(raw)?, body.document),
        None => ChargeContext::document(body.document),
    };

    let usage = if body.enforce {
        let guard = state.budget_service.guard();
        let reservation = guard.reserve(&account_id, cost.total_tokens).await?;
        guard.commit(reservation, cost, &ctx).await?
    } else {
        state
            .budget_service
            .recorder()
            .record_charge(&account_id, cost, &ctx)
            .await?
    };

    Ok(Json(
        timer
            .finish(RecordedUsage {
                account_id: account_id.clone(),
                cost,
                usage,
            })
            .with_link("token-status", format!("/api/v1/accounts/{account_id}/token-status")),
    ))
}
