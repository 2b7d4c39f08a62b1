use axum::{
    extract::Request,
    middleware,
    routing::{get, patch, post},
    Router,
};
use log::{info, warn};
use nestegg_shared::auth::auth_middleware;
use nestegg_shared::config::flag_enabled;
use nestegg_shared::store::dynamo::{DynamoInvitationStore, DynamoSavingsGoalStore};
use nestegg_shared::store::{InvitationStore, SavingsGoalStore};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::invitation_handlers::{
    create_invitation, get_received_invitations, get_sent_invitations, respond_to_invitation,
};
use crate::state::AppState;

/// Creates a router backed by DynamoDB
pub async fn create_router() -> Router {
    info!("Creating invitation router with DynamoDB stores");

    let invitations = Arc::new(DynamoInvitationStore::new().await);
    let goals = Arc::new(DynamoSavingsGoalStore::new().await);

    let prefix = if flag_enabled("REMOVE_BASE_PATH") {
        ""
    } else {
        "/Prod"
    };
    info!("Using API route prefix: {}", prefix);

    create_router_with_stores(invitations, goals, prefix)
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

/// Creates a router over the given store implementations
pub fn create_router_with_stores<I, G>(invitations: Arc<I>, goals: Arc<G>, prefix: &str) -> Router
where
    I: InvitationStore + 'static,
    G: SavingsGoalStore + 'static,
{
    let state = AppState::new(invitations, goals);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/invitations", post(create_invitation::<I, G>))
        .route("/invitations/sent", get(get_sent_invitations::<I, G>))
        .route("/invitations/received", get(get_received_invitations::<I, G>))
        .route(
            "/invitations/:id/respond",
            patch(respond_to_invitation::<I, G>),
        )
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
