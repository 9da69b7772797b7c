use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use edubudget_infra::sqlite::pool::DatabasePool;
use edubudget_types::config::BudgetConfig;

use super::router::build_router;
use crate::state::AppState;

async fn test_app() -> Router {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("api.db").display());
    let data_dir = dir.path().to_path_buf();
    // Leak tempdir so it lives for the test
    std::mem::forget(dir);
    let pool = DatabasePool::new(&url).await.unwrap();
    build_router(AppState::from_pool(pool, BudgetConfig::default(), data_dir))
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, json_body(resp).await)
}

async fn create_admin(app: &Router, limit: u64) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/admins",
        Some(json!({ "name": "Colegio Norte", "email": null, "token_limit": limit })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn create_teacher(app: &Router, admin_id: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        &format!("/api/v1/admins/{admin_id}/teachers"),
        Some(json!({ "name": "Prof. Soto", "email": "SOTO@colegio.test" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_usage"]["limit"], 0);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_usage_status_and_admission_flow() {
    let app = test_app().await;
    let admin = create_admin(&app, 10_000).await;
    let teacher = create_teacher(&app, &admin).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/accounts/{admin}/usage"),
        Some(json!({ "tokens": 8_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/accounts/{teacher}/usage"),
        Some(json!({ "prompt_tokens": 600, "completion_tokens": 400, "document": "ensayo.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["usage"]["used"], 1_000);
    assert_eq!(body["data"]["cost"]["total_tokens"], 1_000);

    let (_, body) = send(&app, "GET", &format!("/api/v1/admins/{admin}/usage"), None).await;
    assert_eq!(body["data"]["used"], 9_000);
    assert_eq!(body["data"]["remaining"], 1_000);
    assert_eq!(body["data"]["teacher_count"], 1);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/admins/{admin}/admission"),
        Some(json!({ "tokens": 1_500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["allowed"], false);
    assert_eq!(body["data"]["excess"], 500);
    assert_eq!(body["data"]["verdict"], "limit_exceeded");

    let (_, body) = send(&app, "GET", &format!("/api/v1/accounts/{teacher}/token-status"), None).await;
    assert_eq!(body["data"]["percentage"], 90.0);
    assert_eq!(body["data"]["status"], "critical");
    assert_eq!(body["data"]["can_analyze"], false);
}

#[tokio::test]
async fn test_preflight_denial_is_forbidden() {
    let app = test_app().await;
    let admin = create_admin(&app, 3_000).await;
    let teacher = create_teacher(&app, &admin).await;

    let (status, body) = send(&app, "POST", &format!("/api/v1/accounts/{teacher}/preflight"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["requested_tokens"], 2_000);

    send(
        &app,
        "POST",
        &format!("/api/v1/accounts/{admin}/usage"),
        Some(json!({ "tokens": 1_500 })),
    )
    .await;

    let (status, body) = send(&app, "POST", &format!("/api/v1/accounts/{teacher}/preflight"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["data"].is_null());
    let error = &body["errors"][0];
    assert_eq!(error["code"], "TOKENS_EXHAUSTED");
    assert_eq!(error["details"]["current_used"], 1_500);
    assert_eq!(error["details"]["limit"], 3_000);
    assert_eq!(error["details"]["requested_tokens"], 2_000);
    assert_eq!(error["details"]["excess"], 500);
}

#[tokio::test]
async fn test_enforced_usage_is_refused_without_charging() {
    let app = test_app().await;
    let admin = create_admin(&app, 5_000).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/accounts/{admin}/usage"),
        Some(json!({ "tokens": 6_000, "enforce": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["errors"][0]["details"]["excess"], 1_000);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/accounts/{admin}/usage"),
        Some(json!({ "tokens": 5_000, "enforce": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["usage"]["used"], 5_000);
}

#[tokio::test]
async fn test_student_usage_is_reported_not_charged() {
    let app = test_app().await;
    let admin = create_admin(&app, 10_000).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/admins/{admin}/students"),
        Some(json!({ "name": "Valentina", "course": "4A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let student = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/students/{student}/usage"),
        Some(json!({ "prompt_tokens": 40_000, "completion_tokens": 10_000, "document": "tesis.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", &format!("/api/v1/admins/{admin}/usage"), None).await;
    assert_eq!(body["data"]["students_usage"], 50_000);
    assert_eq!(body["data"]["used"], 0);

    let (_, body) = send(&app, "GET", &format!("/api/v1/students/{student}/tokens"), None).await;
    assert_eq!(body["data"]["total_tokens"], 50_000);
    assert_eq!(body["data"]["request_count"], 1);

    let (_, body) = send(&app, "GET", &format!("/api/v1/admins/{admin}/students/tokens"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_mapping() {
    let app = test_app().await;
    let missing = uuid::Uuid::now_v7();

    let (status, body) = send(&app, "GET", &format!("/api/v1/accounts/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"][0]["code"], "ACCOUNT_NOT_FOUND");

    let (status, body) = send(&app, "GET", "/api/v1/accounts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/admins/{missing}/admission"),
        Some(json!({ "tokens": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verdict"], "admin_not_found");

    let admin = create_admin(&app, 1_000).await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/accounts/{admin}/usage"),
        Some(json!({ "tokens": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/admins/{admin}/limit"),
        Some(json!({ "token_limit": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/v1/admins/{admin}/limit"),
        Some(json!({ "token_limit": 2_500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_usage"]["limit"], 2_500);
}

#[tokio::test]
async fn test_overflowing_usage_is_a_validation_error() {
    let app = test_app().await;
    let admin = create_admin(&app, 10_000).await;
    let uri = format!("/api/v1/accounts/{admin}/usage");

    let (status, _) = send(&app, "POST", &uri, Some(json!({ "tokens": i64::MAX }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", &uri, Some(json!({ "tokens": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, "GET", &format!("/api/v1/accounts/{admin}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_usage"]["used"], i64::MAX);

    let (status, body) = send(&app, "GET", &format!("/api/v1/admins/{admin}/status"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "exhausted");
}
