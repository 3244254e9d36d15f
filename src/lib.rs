pub mod config;
pub mod consensus;
pub mod error;
pub mod eth;
pub mod monitor;
pub mod providers;
pub mod relay;
pub mod routes;
pub mod state;
pub mod store;
pub mod types;

use axum::Router;
use state::AppState;

pub fn app(state: AppState) -> Router {
    routes::router(state)
}
