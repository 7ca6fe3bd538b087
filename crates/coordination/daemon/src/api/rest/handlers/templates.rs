//! Template management handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use coordination_types::{Template, TemplateId};
use serde::{Deserialize, Serialize};

/// Create template request
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub template: Template,
}

/// Create template response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTemplateResponse {
    pub id: TemplateId,
    pub created: bool,
}

/// Listing entry for a registered template
#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: TemplateId,
    pub name: String,
    pub version: String,
    pub is_active: bool,
    pub category: Option<String>,
    pub states: usize,
}

/// Register a new template version
pub async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> ApiResult<Json<CreateTemplateResponse>> {
    let id = state.coordinator.register_template(request.template)?;
    Ok(Json(CreateTemplateResponse { id, created: true }))
}

/// List registered templates
pub async fn list_templates(State(state): State<AppState>) -> Json<Vec<TemplateSummary>> {
    let mut summaries: Vec<TemplateSummary> = state
        .coordinator
        .templates()
        .list()
        .iter()
        .map(|t| TemplateSummary {
            id: t.id.clone(),
            name: t.name.clone(),
            version: t.version.clone(),
            is_active: t.is_active,
            category: t.category.clone(),
            states: t.states.len(),
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
    Json(summaries)
}

/// Get a specific template
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Template>> {
    let template = state.coordinator.template(&TemplateId::new(id))?;
    Ok(Json(Template::clone(&template)))
}
