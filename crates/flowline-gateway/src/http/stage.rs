use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use flowline_auth::TenantContext;
use flowline_core::ids::{AgentId, StageId, TemplateId};
use flowline_core::FlowlineError;
use flowline_store::Stage;
use serde::Deserialize;
use std::collections::HashMap;

use crate::app::AppState;
use crate::http::business::resolve_target_business;

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub business_id: Option<String>,
    pub agent_id: Option<String>,
    pub stage_name: String,
    pub stage_description: Option<String>,
    pub stage_type: String,
    pub stage_selection_template_id: String,
    pub data_extraction_template_id: String,
    pub response_generation_template_id: String,
}

fn parse_template_id(raw: &str, field: &str) -> Result<TemplateId, FlowlineError> {
    raw.parse().map_err(|_| FlowlineError::InvalidRequest(format!("invalid {field}")))
}

/// POST /stages
pub async fn create_stage(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Json(req): Json<StageRequest>,
) -> Result<Json<Stage>, FlowlineError> {
    let business_id = resolve_target_business(&ctx, req.business_id.as_deref())?;
    let agent_id = req
        .agent_id
        .as_deref()
        .map(|s| s.parse::<AgentId>().map_err(|_| FlowlineError::InvalidRequest("invalid agent_id".to_string())))
        .transpose()?;
    let now = Utc::now();
    let stage = Stage {
        stage_id: StageId::new(),
        business_id,
        agent_id,
        stage_name: req.stage_name,
        stage_description: req.stage_description,
        stage_type: req.stage_type,
        stage_selection_template_id: parse_template_id(&req.stage_selection_template_id, "stage_selection_template_id")?,
        data_extraction_template_id: parse_template_id(&req.data_extraction_template_id, "data_extraction_template_id")?,
        response_generation_template_id: parse_template_id(&req.response_generation_template_id, "response_generation_template_id")?,
        created_at: now,
        updated_at: now,
    };
    state.store.create_stage(&stage)?;
    Ok(Json(stage))
}

/// GET /stages?business_id=...
pub async fn list_stages(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Stage>>, FlowlineError> {
    let business_id = resolve_target_business(&ctx, query.get("business_id").map(String::as_str))?;
    Ok(Json(state.store.list_stages(&business_id)?))
}

/// GET /stages/{id}
pub async fn get_stage(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<Json<Stage>, FlowlineError> {
    let id: StageId = id.parse().map_err(|_| FlowlineError::InvalidRequest("invalid stage id".to_string()))?;
    let stage = state.store.get_stage(&id)?;
    if !ctx.may_act_for(&stage.business_id) {
        return Err(FlowlineError::Forbidden);
    }
    Ok(Json(stage))
}

/// PUT /stages/{id}
pub async fn update_stage(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(req): Json<StageRequest>,
) -> Result<Json<Stage>, FlowlineError> {
    let id: StageId = id.parse().map_err(|_| FlowlineError::InvalidRequest("invalid stage id".to_string()))?;
    let existing = state.store.get_stage(&id)?;
    if !ctx.may_act_for(&existing.business_id) {
        return Err(FlowlineError::Forbidden);
    }
    let agent_id = req
        .agent_id
        .as_deref()
        .map(|s| s.parse::<AgentId>().map_err(|_| FlowlineError::InvalidRequest("invalid agent_id".to_string())))
        .transpose()?;
    let stage = Stage {
        stage_id: id,
        business_id: existing.business_id,
        agent_id,
        stage_name: req.stage_name,
        stage_description: req.stage_description,
        stage_type: req.stage_type,
        stage_selection_template_id: parse_template_id(&req.stage_selection_template_id, "stage_selection_template_id")?,
        data_extraction_template_id: parse_template_id(&req.data_extraction_template_id, "data_extraction_template_id")?,
        response_generation_template_id: parse_template_id(&req.response_generation_template_id, "response_generation_template_id")?,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };
    state.store.update_stage(&stage)?;
    Ok(Json(stage))
}

/// DELETE /stages/{id}
pub async fn delete_stage(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, FlowlineError> {
    let id: StageId = id.parse().map_err(|_| FlowlineError::InvalidRequest("invalid stage id".to_string()))?;
    let existing = state.store.get_stage(&id)?;
    if !ctx.may_act_for(&existing.business_id) {
        return Err(FlowlineError::Forbidden);
    }
    state.store.delete_stage(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
