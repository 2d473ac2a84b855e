use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // Availability and the condition catalog feed the public booking wizard;
    // everything touching appointment records requires authentication.
    let public_routes = Router::new()
        .route("/availability/{doctor_id}", get(handlers::get_doctor_availability))
        .route("/health-categories", get(handlers::get_health_categories))
        .route("/health-conditions", get(handlers::get_health_conditions));

    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::get_my_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", put(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
