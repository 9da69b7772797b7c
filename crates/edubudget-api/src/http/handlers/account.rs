//! Admin and teacher account handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use edubudget_types::account::{Account, CreateAdminRequest, CreateTeacherRequest};
use edubudget_types::error::validate_amount;

use super::parse_account_id;
use crate::http::response::{ApiResult, RequestTimer};
use crate::state::AppState;

/// Body of `PUT /admins/{id}/limit`.
#[derive(Debug, Deserialize)]
pub struct SetLimitBody {
    pub token_limit: i64,
}

/// POST /api/v1/admins - Create an admin (tenant root).
pub async fn create_admin(
    State(state): State<AppState>,
    Json(body): Json<CreateAdminRequest>,
) -> ApiResult<Account> {
    let timer = RequestTimer::start();

    let admin = state.account_service.create_admin(body).await?;
    let self_link = format!("/api/v1/accounts/{}", admin.id);
    let status_link = format!("/api/v1/admins/{}/status", admin.id);

    Ok(Json(
        timer
            .finish(admin)
            .with_link("self", self_link)
            .with_link("status", status_link),
    ))
}

/// GET /api/v1/admins - List admins, oldest first.
pub async fn list_admins(State(state): State<AppState>) -> ApiResult<Vec<Account>> {
    let timer = RequestTimer::start();
    let admins = state.account_service.list_admins().await?;
    Ok(Json(timer.finish(admins).with_link("self", "/api/v1/admins")))
}

/// PUT /api/v1/admins/{id}/limit - Replace an admin's token ceiling.
pub async fn set_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SetLimitBody>,
) -> ApiResult<Account> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;
    let limit = validate_amount(body.token_limit)?;

    let admin = state.account_service.set_admin_limit(&admin_id, limit).await?;
    Ok(Json(
        timer
            .finish(admin)
            .with_link("self", format!("/api/v1/accounts/{admin_id}")),
    ))
}

/// POST /api/v1/admins/{id}/teachers - Create a teacher under an admin.
pub async fn create_teacher(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CreateTeacherRequest>,
) -> ApiResult<Account> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;

    let teacher = state.account_service.create_teacher(&admin_id, body).await?;
    let self_link = format!("/api/v1/accounts/{}", teacher.id);

    Ok(Json(
        timer
            .finish(teacher)
            .with_link("self", self_link)
            .with_link("admin", format!("/api/v1/accounts/{admin_id}")),
    ))
}

/// GET /api/v1/admins/{id}/teachers
pub async fn list_teachers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Account>> {
    let timer = RequestTimer::start();
    let admin_id = parse_account_id(&id)?;
    let teachers = state.account_service.list_teachers(&admin_id).await?;
    Ok(Json(timer.finish(teachers)))
}

/// GET /api/v1/accounts/{id}
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Account> {
    let timer = RequestTimer::start();
    let account_id = parse_account_id(&id)?;
    let account = state.account_service.get_account(&account_id).await?;
    Ok(Json(
        timer
            .finish(account)
            .with_link("self", format!("/api/v1/accounts/{account_id}"))
            .with_link("token-status", format!("/api/v1/accounts/{account_id}/token-status")),
    ))
}

/// DELETE /api/v1/accounts/{id} - Delete an account. Deleting an admin
/// removes its teachers and students as well.
pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let timer = RequestTimer::start();
    let account_id = parse_account_id(&id)?;
    state.account_service.delete_account(&account_id).await?;
    Ok(Json(timer.finish(serde_json::json!({ "deleted": true }))))
}
