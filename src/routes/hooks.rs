//! Hook Routes
//!
//! The hot path: pre-execution checks and post-execution analysis.
//! Both endpoints are fail-open - whatever happens inside the pipeline,
//! the caller gets a well-formed result.

use crate::error::ApiResult;
use crate::guard::types::{HookEvent, PostAnalyzeResult, PostEvent, PreCheckResult};
use crate::state::SharedState;
use axum::{extract::State, Json};

/// POST /hooks/preCheck - decide whether an operation may proceed
pub async fn pre_check(
    State(state): State<SharedState>,
    Json(event): Json<HookEvent>,
) -> ApiResult<Json<PreCheckResult>> {
    let result = state.guard.pre_check(event).await;
    Ok(Json(result))
}

/// POST /hooks/postAnalyze - analyze an operation that already ran
pub async fn post_analyze(
    State(state): State<SharedState>,
    Json(event): Json<PostEvent>,
) -> ApiResult<Json<PostAnalyzeResult>> {
    let result = state.guard.post_analyze(event).await;
    Ok(Json(result))
}
