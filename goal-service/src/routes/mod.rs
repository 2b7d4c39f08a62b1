use axum::{
    extract::Request,
    middleware,
    routing::{get, post, put},
    Router,
};
use log::{info, warn};
use nestegg_shared::auth::auth_middleware;
use nestegg_shared::config::flag_enabled;
use nestegg_shared::store::dynamo::{DynamoLoanStore, DynamoPushTokenStore, DynamoSavingsGoalStore};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{
    goal_handlers::{
        add_contribution, create_goal, delete_goal, get_goal, get_goal_progress, get_goals,
        set_goal_reminder, update_goal,
    },
    loan_handlers::{create_loan, get_loan, get_loans, record_loan_payment},
    user_handlers::register_push_token,
};
use crate::state::AppState;

/// Creates a router backed by DynamoDB
pub async fn create_router() -> Router {
    info!("Creating goal router with DynamoDB stores");

    let state = AppState {
        goals: Arc::new(DynamoSavingsGoalStore::new().await),
        loans: Arc::new(DynamoLoanStore::new().await),
        push_tokens: Arc::new(DynamoPushTokenStore::new().await),
    };

    let prefix = if flag_enabled("REMOVE_BASE_PATH") {
        ""
    } else {
        "/Prod"
    };
    info!("Using API route prefix: {}", prefix);

    create_router_with_state(state, prefix)
}

async fn logging_middleware(
    req: Request,
    next: axum::middleware::Next,
) -> impl axum::response::IntoResponse {
    info!(
        "Router received request: method={}, uri={}",
        req.method(),
        req.uri()
    );
    next.run(req).await
}

/// Creates a router over the given stores
pub fn create_router_with_state(state: AppState, prefix: &str) -> Router {
    info!("Setting up API routes with prefix: '{}'", prefix);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/goals", get(get_goals).post(create_goal))
        .route(
            "/goals/:id",
            get(get_goal).patch(update_goal).delete(delete_goal),
        )
        .route("/goals/:id/contributions", post(add_contribution))
        .route("/goals/:id/progress", get(get_goal_progress))
        .route("/goals/:id/reminder", put(set_goal_reminder))
        .route("/loans", get(get_loans).post(create_loan))
        .route("/loans/:id", get(get_loan))
        .route("/loans/:id/payments", post(record_loan_payment))
        .route("/users/push-token", put(register_push_token))
        .layer(middleware::from_fn(auth_middleware))
        .with_state(state);

    let router = if prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(prefix, api_routes)
    };

    router
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .fallback(|req: Request| async move {
            warn!("No route matched for: {} {}", req.method(), req.uri());
            (
                axum::http::StatusCode::NOT_FOUND,
                "The requested resource was not found".to_string(),
            )
        })
}
