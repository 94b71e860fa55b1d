use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::request_id;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Behavior tracking
        .route("/interactions", post(handlers::record_interaction))
        .route("/interactions/track", post(handlers::track_interaction))
        .route(
            "/users/:user_id/behavior",
            get(handlers::get_behavior_profile),
        )
        .route("/users/:user_id/stats", get(handlers::get_user_stats))
        .route(
            "/users/:user_id/categories",
            get(handlers::get_interest_categories),
        )
        .route("/users/:user_id/similar", get(handlers::get_similar_users))
        .route(
            "/users/:user_id/interactions",
            get(handlers::get_interaction_history).delete(handlers::clear_interaction_history),
        )
        // Post analytics
        .route("/posts/:post_id/analytics", get(handlers::get_post_analytics))
        // Moderation
        .route("/moderation/screen", post(handlers::screen_content))
        .route(
            "/moderation/rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route(
            "/moderation/rules/:rule_id",
            patch(handlers::update_rule).delete(handlers::delete_rule),
        )
        .route("/moderation/violations", get(handlers::list_violations))
        .route(
            "/moderation/violations/:violation_id",
            patch(handlers::review_violation),
        )
        .layer(TraceLayer::new_for_http().make_span_with(request_id::make_span))
        .layer(middleware::from_fn(request_id::attach_request_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
