//! Participant handlers: invites and revocation

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use coordination_engine::Invitation;
use coordination_types::{Participant, ParticipantId, ParticipantIdentity, RoleName, RunId};
use serde::Deserialize;

/// Invite request
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub role: RoleName,
    #[serde(default)]
    pub identity: ParticipantIdentity,
}

/// Revoke request
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    #[serde(default)]
    pub reason: String,
}

/// Invite a participant and hand back their magic token
pub async fn invite_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<InviteRequest>,
) -> ApiResult<Json<Invitation>> {
    let invitation = state
        .coordinator
        .invite(&RunId::new(id), &request.role, request.identity)?;
    Ok(Json(invitation))
}

/// List the participants of a run, revoked ones included
pub async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Participant>>> {
    Ok(Json(state.coordinator.participants(&RunId::new(id))?))
}

/// Revoke a participant's access
pub async fn revoke_participant(
    State(state): State<AppState>,
    Path((id, participant_id)): Path<(String, String)>,
    Json(request): Json<RevokeRequest>,
) -> ApiResult<Json<Participant>> {
    let participant = state.coordinator.revoke(
        &RunId::new(id),
        &ParticipantId::new(participant_id),
        &request.reason,
    )?;
    Ok(Json(participant))
}
