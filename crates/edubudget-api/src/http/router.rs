//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Admins
        .route(
            "/admins",
            post(handlers::account::create_admin).get(handlers::account::list_admins),
        )
        .route("/admins/{id}/limit", put(handlers::account::set_limit))
        .route(
            "/admins/{id}/teachers",
            post(handlers::account::create_teacher).get(handlers::account::list_teachers),
        )
        .route(
            "/admins/{id}/students",
            post(handlers::student::add_student).get(handlers::student::list_students),
        )
        .route(
            "/admins/{id}/students/tokens",
            get(handlers::student::list_summaries),
        )
        // Budget
        .route("/admins/{id}/usage", get(handlers::budget::get_usage))
        .route(
            "/admins/{id}/admission",
            post(handlers::budget::check_admission),
        )
        .route("/admins/{id}/status", get(handlers::budget::get_status))
        // Accounts (admin or teacher)
        .route(
            "/accounts/{id}",
            get(handlers::account::get_account).delete(handlers::account::delete_account),
        )
        .route("/accounts/{id}/usage", post(handlers::budget::record_usage))
        .route("/accounts/{id}/preflight", post(handlers::budget::preflight))
        .route(
            "/accounts/{id}/token-status",
            get(handlers::budget::get_token_status),
        )
        // Students
        .route(
            "/students/{id}",
            get(handlers::student::get_student).delete(handlers::student::delete_student),
        )
        .route("/students/{id}/usage", post(handlers::student::record_usage))
        .route("/students/{id}/tokens", get(handlers::student::get_summary));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
