//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        .route("/status", get(handlers::daemon_status))
        // Templates
        .route("/templates", get(handlers::list_templates))
        .route("/templates", post(handlers::create_template))
        .route("/templates/:id", get(handlers::get_template))
        // Runs (operator)
        .route("/runs", get(handlers::list_runs))
        .route("/runs", post(handlers::create_run))
        .route("/runs/:id", get(handlers::get_run))
        .route("/runs/:id/history", get(handlers::get_history))
        .route("/runs/:id/abandon", post(handlers::abandon_run))
        // Participants (operator)
        .route("/runs/:id/participants", get(handlers::list_participants))
        .route("/runs/:id/participants", post(handlers::invite_participant))
        .route(
            "/runs/:id/participants/:participant_id/revoke",
            post(handlers::revoke_participant),
        )
        // Magic links (participant token)
        .route("/runs/:id/context", get(handlers::get_context))
        .route("/runs/:id/slots/:slot", put(handlers::write_slot))
        .route("/runs/:id/advance", post(handlers::advance_run))
        .route("/runs/:id/tokens/rotate", post(handlers::rotate_token));

    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
