use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use planner_core::PlannerConfig;
use planner_directory::Directory;
use planner_events::EventService;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: PlannerConfig,
    pub events: Arc<EventService>,
    pub directory: Arc<Directory>,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/events",
            get(crate::http::events::get_events_handler).post(crate::http::events::create_event_handler),
        )
        .route(
            "/events/{id}",
            get(crate::http::events::get_event_handler)
                .put(crate::http::events::update_event_handler)
                .delete(crate::http::events::delete_event_handler),
        )
        .route("/groups", post(crate::http::groups::create_group_handler))
        .route(
            "/groups/{id}",
            get(crate::http::groups::get_group_handler).put(crate::http::groups::update_group_handler),
        )
        .route(
            "/groups/{id}/settings",
            put(crate::http::groups::update_settings_handler),
        )
        .route(
            "/groups/{id}/members",
            post(crate::http::groups::add_member_handler),
        )
        .route(
            "/groups/{id}/members/{user_id}",
            axum::routing::delete(crate::http::groups::remove_member_handler),
        )
        .route("/users", post(crate::http::users::create_user_handler))
        .route("/users/{id}", get(crate::http::users::get_user_handler))
        .route(
            "/users/{id}/groups",
            get(crate::http::users::get_user_groups_handler),
        )
        .route(
            "/users/{id}/push_token",
            put(crate::http::users::update_push_token_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
