//! Run management handlers (operator side)

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use coordination_types::{Initiator, Run, RunId, RunStateEntry, StateName, TemplateId};
use serde::{Deserialize, Serialize};

/// Create run request
#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub template_id: TemplateId,
    pub initiator: Initiator,
}

/// Run plus where it can go next
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    #[serde(flatten)]
    pub run: Run,
    pub next_states: Vec<StateName>,
}

/// Abandon run request
#[derive(Debug, Deserialize)]
pub struct AbandonRequest {
    pub reason: String,
}

/// Create a run from a template
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> ApiResult<Json<Run>> {
    let run = state
        .coordinator
        .create_run(&request.template_id, request.initiator)?;
    Ok(Json(run))
}

/// List all runs
pub async fn list_runs(State(state): State<AppState>) -> ApiResult<Json<Vec<Run>>> {
    Ok(Json(state.coordinator.list_runs()?))
}

/// Get a specific run
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RunResponse>> {
    let run_id = RunId::new(id);
    let run = state.coordinator.get_run(&run_id)?;
    let next_states = state.coordinator.next_states(&run_id)?;
    Ok(Json(RunResponse { run, next_states }))
}

/// Get a run's state history
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<RunStateEntry>>> {
    Ok(Json(state.coordinator.history(&RunId::new(id))?))
}

/// Abandon an active run
pub async fn abandon_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AbandonRequest>,
) -> ApiResult<Json<Run>> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("reason must not be empty".to_string()));
    }
    let run = state
        .coordinator
        .abandon(&RunId::new(id), request.reason.trim())?;
    Ok(Json(run))
}
