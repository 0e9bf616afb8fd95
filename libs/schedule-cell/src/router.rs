// libs/schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_schedule).get(handlers::get_my_schedule))
        .route("/{doctor_id}", get(handlers::get_schedule))
        .route("/{doctor_id}", put(handlers::update_schedule))
        .route("/{doctor_id}", delete(handlers::delete_schedule))
        .route("/{doctor_id}/block-date", post(handlers::block_date))
        .route("/{doctor_id}/unblock-date", delete(handlers::unblock_date))
        .route("/{doctor_id}/recurring-slots", post(handlers::add_recurring_slots))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
