use axum::{Router, routing::get};

pub mod guest_stays;
pub mod system;

/// Router for all API endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/guests", guest_stays::router())
}
