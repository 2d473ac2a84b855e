use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Profile reads are public; schedule maintenance requires authentication.
    let public_routes = Router::new().route("/{doctor_id}", get(handlers::get_doctor_profile));

    let protected_routes = Router::new()
        .route("/{doctor_id}/schedule", put(handlers::update_doctor_schedule))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
