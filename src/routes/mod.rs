use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub mod resolve;
pub mod status;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/resolve", post(resolve::resolve_market))
        .route("/status", get(status::get_status))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
