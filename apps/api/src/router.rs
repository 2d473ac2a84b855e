use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Medlink API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/doctors", doctor_routes(state))
}
