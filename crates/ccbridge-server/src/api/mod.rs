//! HTTP surface.

pub mod error;
pub mod routes;
pub mod types;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use crate::orchestrator::Orchestrator;
use crate::users::UserStore;

pub use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub users: Arc<UserStore>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            users: Arc::new(UserStore::new()),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(routes::execute))
        .route("/execute/background", post(routes::execute_background))
        .route("/health", get(routes::health))
        .route("/users", post(routes::create_user))
        .route("/users/{id}", get(routes::get_user))
        .route("/users/{id}/address", put(routes::update_address))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
