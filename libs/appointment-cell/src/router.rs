// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/approve", patch(handlers::approve_appointment))
        .route("/{appointment_id}/reject", patch(handlers::reject_appointment))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/complete", patch(handlers::complete_appointment))
        .route("/{appointment_id}/start-consultation", patch(handlers::start_consultation))
        .route("/{appointment_id}/chat", patch(handlers::set_chat))
        .route("/{appointment_id}/notes", patch(handlers::attach_notes))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/order", post(handlers::create_payment_order))
        .route("/verify", post(handlers::verify_payment))
        .route("/unlock", post(handlers::unlock_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
