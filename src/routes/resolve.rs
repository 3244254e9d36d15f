use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::state::AppState;
use crate::types::Outcome;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    #[serde(default)]
    pub market_description: String,
    pub price_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub outcome: Outcome,
    pub confidence: u8,
    pub consensus_count: usize,
    pub total_models: usize,
    pub votes: Vec<VoteView>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct VoteView {
    pub provider: &'static str,
    pub vote: Outcome,
    pub confidence: u8,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub details: String,
}

/// Direct consensus query for the CLI/web layer; never touches the ledger.
pub async fn resolve_market(
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, (StatusCode, Json<ErrorBody>)> {
    if payload.market_description.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "bad request",
                details: "marketDescription is required".into(),
            }),
        ));
    }

    let result = state
        .engine
        .resolve(&payload.market_description, payload.price_id.as_deref())
        .await
        .map_err(|err| match err {
            OracleError::BadRequest(details) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody { error: "bad request", details }))
            }
            err => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody { error: "resolution failed", details: err.to_string() }),
            ),
        })?;

    let votes = result
        .votes
        .iter()
        .map(|v| VoteView { provider: v.provider, vote: v.outcome, confidence: v.confidence })
        .collect();

    Ok(Json(ResolveResponse {
        outcome: result.outcome,
        confidence: result.agreement_percent,
        consensus_count: result.winning_votes,
        total_models: result.total_votes,
        votes,
        timestamp: result.decided_at,
    }))
}
