//! Consensus, chaos feedback, and introspection routes

use crate::error::{validation_error, ApiResult};
use crate::guard::risk::RuleInfo;
use crate::guard::types::{ChaosOutcome, ConsensusRequest, ConsensusResult, StatsSnapshot};
use crate::models::MessageResponse;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleListResponse {
    pub rules: Vec<RuleInfo>,
}

/// POST /consensus/request - caller-initiated consensus over a topic
pub async fn request_consensus(
    State(state): State<SharedState>,
    Json(request): Json<ConsensusRequest>,
) -> ApiResult<Json<ConsensusResult>> {
    request
        .validate()
        .map_err(|e| validation_error(e.to_string()))?;

    let result = state.guard.request_consensus(request).await;
    Ok(Json(result))
}

/// POST /chaos/{id}/result - record how a chaos-forced request turned out
pub async fn record_chaos_result(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(outcome): Json<ChaosOutcome>,
) -> ApiResult<Json<MessageResponse>> {
    state.guard.record_chaos_result(id, outcome).await;
    Ok(Json(MessageResponse::new(format!(
        "Recorded chaos outcome for {}",
        id
    ))))
}

/// GET /stats - read-only snapshot of the running statistics
pub async fn get_stats(State(state): State<SharedState>) -> ApiResult<Json<StatsSnapshot>> {
    Ok(Json(state.guard.stats().await))
}

/// POST /stats/clear - reset cache and counters
pub async fn clear_stats(State(state): State<SharedState>) -> ApiResult<Json<MessageResponse>> {
    state.guard.clear().await;
    Ok(Json(MessageResponse::new("Guard state cleared")))
}

/// GET /rules - the active risk rule table
pub async fn list_rules(State(state): State<SharedState>) -> ApiResult<Json<RuleListResponse>> {
    Ok(Json(RuleListResponse {
        rules: state.guard.rules(),
    }))
}
