use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/token", post(handlers::refresh_token))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/logout-all", post(handlers::logout_all))
        .route("/auth/me", get(handlers::me))
        .route("/auth/devices", get(handlers::devices));

    // Literal segments win over captures, so /posts/trending never hits get_post
    let post_routes = Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts/trending", get(handlers::trending))
        .route("/posts/:id", get(handlers::get_post))
        .route(
            "/posts/:id/vote",
            get(handlers::my_vote).put(handlers::cast_vote),
        );

    let mut internal_routes = Router::new().route("/_internal/health", get(handlers::health));

    // Test-only routes -- dangerous operations gated behind TEST_MODE
    if state.config.test_mode {
        tracing::warn!("Test mode enabled: purge route is available");
        internal_routes = internal_routes.route("/admin/purge", delete(handlers::admin_purge));
    }

    Router::new()
        .merge(auth_routes)
        .merge(post_routes)
        .merge(internal_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
