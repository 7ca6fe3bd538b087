//! Magic-link handlers: every call here authenticates with a participant token

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use coordination_engine::{AdvanceOutcome, AdvanceRequest, RunContext};
use coordination_types::{MagicToken, RunId, SlotName, SlotValue};
use serde::{Deserialize, Serialize};

/// Token carried in the query string of a magic link
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

/// Slot write request
#[derive(Debug, Deserialize)]
pub struct WriteSlotRequest {
    pub token: String,
    pub value: serde_json::Value,
}

/// Advance request
#[derive(Debug, Deserialize)]
pub struct AdvanceBody {
    pub token: String,
    #[serde(flatten)]
    pub request: AdvanceRequest,
}

/// Token rotation request
#[derive(Debug, Deserialize)]
pub struct RotateRequest {
    pub token: String,
}

/// Token rotation response
#[derive(Debug, Serialize, Deserialize)]
pub struct RotateResponse {
    pub token: MagicToken,
}

/// Validate a magic link and return the participant's view of the run
pub async fn get_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<RunContext>> {
    let context = state
        .coordinator
        .validate_link(&RunId::new(id), &query.token)?;
    Ok(Json(context))
}

/// Write a slot value
pub async fn write_slot(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    Json(request): Json<WriteSlotRequest>,
) -> ApiResult<Json<SlotValue>> {
    let value = state.coordinator.write_slot(
        &RunId::new(id),
        &request.token,
        &SlotName::new(slot),
        request.value,
    )?;
    Ok(Json(value))
}

/// Advance the run out of its current state
pub async fn advance_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AdvanceBody>,
) -> ApiResult<Json<AdvanceOutcome>> {
    let outcome = state
        .coordinator
        .advance(&RunId::new(id), &body.token, body.request)?;
    Ok(Json(outcome))
}

/// Rotate the caller's own token
pub async fn rotate_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RotateRequest>,
) -> ApiResult<Json<RotateResponse>> {
    let token = state
        .coordinator
        .rotate_token(&RunId::new(id), &request.token)?;
    Ok(Json(RotateResponse { token }))
}
