use axum::{extract::State, Json};

use crate::monitor::MonitorStatus;
use crate::state::AppState;

pub async fn get_status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.monitor.status().await)
}
